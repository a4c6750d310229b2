/**
Runtime routines

Hand-written subroutines emitted into every program. They are called with
`rsp` on the data stack and only clobber caller-saved registers.
*/

/// An assembly subroutine emitted ahead of `_start`
pub struct RuntimeRoutine {
    pub name: &'static str,
    pub description: &'static str,
    pub body: &'static str,
}

/// All runtime routines, in emission order
pub const RUNTIME_ROUTINES: &[RuntimeRoutine] = &[PRINT_DECIMAL, STR_EQUAL];

pub const PRINT_DECIMAL: RuntimeRoutine = RuntimeRoutine {
    name: "print_decimal",
    description: "print_decimal(rdi: i64): write rdi as signed decimal plus newline to stdout",
    body: "    sub rsp, 32
    mov rax, rdi
    xor r8, r8
    test rax, rax
    jns .digits
    neg rax
    mov r8, 1
.digits:
    lea rsi, [rsp + 31]
    mov byte [rsi], 10
    mov rcx, 10
.next:
    xor rdx, rdx
    div rcx
    add dl, '0'
    dec rsi
    mov [rsi], dl
    test rax, rax
    jnz .next
    test r8, r8
    jz .write
    dec rsi
    mov byte [rsi], '-'
.write:
    mov rax, 1
    mov rdi, 1
    lea rdx, [rsp + 32]
    sub rdx, rsi
    syscall
    add rsp, 32
    ret
",
};

pub const STR_EQUAL: RuntimeRoutine = RuntimeRoutine {
    name: "str_equal",
    description: "str_equal(rcx: len, rdi: ptr, rdx: len, rsi: ptr) -> rax: 1 when the byte ranges are equal",
    body: "    xor rax, rax
    cmp rcx, rdx
    jne .done
.compare:
    test rcx, rcx
    jz .equal
    mov r8b, [rdi]
    cmp r8b, [rsi]
    jne .done
    inc rdi
    inc rsi
    dec rcx
    jmp .compare
.equal:
    mov rax, 1
.done:
    ret
",
};
