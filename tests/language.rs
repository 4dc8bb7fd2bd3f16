use glang::{InterpretError, Location, VM};

fn run(source: &str) -> (String, Result<(), InterpretError>) {
    let mut vm = VM::with_output(Vec::<u8>::new());
    let result = vm.interpret(source);
    let output = String::from_utf8(vm.into_output()).unwrap();
    (output, result)
}

fn output(source: &str) -> String {
    let (output, result) = run(source);
    if let Err(e) = result {
        panic!("{} failed:\n{}", source, e);
    }
    output
}

fn runtime_error(source: &str) -> (String, glang::RuntimeError) {
    match run(source) {
        (output, Err(InterpretError::Runtime(e))) => (output, e),
        (_, other) => panic!("expected a runtime error, got {:?}", other),
    }
}

fn compile_error(source: &str) -> glang::CompileError {
    match run(source) {
        (output, Err(InterpretError::Compile(e))) => {
            assert_eq!(output, "", "nothing runs after a compile error");
            e
        }
        (_, other) => panic!("expected a compile error, got {:?}", other),
    }
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(output("print 1 + 2 * 3;"), "7\n");
    assert_eq!(output("print (1 + 2) * 3;"), "9\n");
    assert_eq!(output("print 10 - 4 - 3;"), "3\n");
    assert_eq!(output("print -2 * -3;"), "6\n");
    assert_eq!(output("print 7 / 2;"), "3.5\n");
}

#[test]
fn literals() {
    assert_eq!(
        output("print nil; print true; print false; print 0.25; print \"str\";"),
        "Nil\nTrue\nFalse\n0.25\nstr\n"
    );
}

#[test]
fn comparisons() {
    assert_eq!(
        output("print 1 < 2; print 2 <= 2; print 3 > 4; print 3 >= 4;"),
        "True\nTrue\nFalse\nFalse\n"
    );
    assert_eq!(
        output("print 1 == 1; print 1 != 1;"),
        "True\nFalse\n"
    );
    assert_eq!(
        output("print nil == false; print \"a\" == \"a\"; print 1 == \"1\";"),
        "False\nTrue\nFalse\n"
    );
}

#[test]
fn truthiness() {
    assert_eq!(
        output("print !nil; print !false; print !0; print !\"\";"),
        "True\nTrue\nFalse\nFalse\n"
    );
}

#[test]
fn string_concatenation() {
    assert_eq!(output("print \"foo\" + \"bar\";"), "foobar\n");
    assert_eq!(
        output("def a = \"ab\"; def b = \"c\"; print a + b == \"abc\";"),
        "True\n"
    );
}

#[test]
fn global_variables() {
    assert_eq!(output("def a = 1; def b = 2; print a + b;"), "3\n");
    assert_eq!(output("def a; print a;"), "Nil\n");
    assert_eq!(output("def a = 1; a = 2; print a;"), "2\n");
    assert_eq!(output("def a = 1; def a = 5; print a;"), "5\n");
    assert_eq!(output("def a; def b; a = b = 3; print a; print b;"), "3\n3\n");
}

#[test]
fn local_scopes_shadow() {
    assert_eq!(
        output("def a = 1; { def a = 2; print a; } print a;"),
        "2\n1\n"
    );
    assert_eq!(
        output("{ def a = 1; { def b = a + 1; a = b; } print a; }"),
        "2\n"
    );
}

#[test]
fn inner_local_shadows_outer_local() {
    assert_eq!(
        output("{ def x = 1; { def x = 2; print x; } print x; }"),
        "2\n1\n"
    );
}

#[test]
fn large_and_small_numbers_use_exponents() {
    assert_eq!(
        output("print 1000000000000000000000; print 0.00001; print 123.5;"),
        "1e+21\n1e-05\n123.5\n"
    );
}

#[test]
fn type_errors() {
    let (out, e) = runtime_error("print -\"x\";");
    assert_eq!(out, "");
    assert_eq!(e.message, "Operand must be a number.");

    let (_, e) = runtime_error("print 1 - nil;");
    assert_eq!(e.message, "Operands must be numbers.");

    let (_, e) = runtime_error("print 1 < \"2\";");
    assert_eq!(e.message, "Operands must be numbers.");

    let (_, e) = runtime_error("print 1 + \"2\";");
    assert_eq!(e.message, "Operands must be two numbers or two strings.");
}

#[test]
fn runtime_error_reports_line() {
    let (out, e) = runtime_error("print 1;\n\nprint true * 2;\nprint 3;");
    assert_eq!(out, "1\n");
    assert_eq!(e.line, 3);
    assert_eq!(e.to_string(), "Operands must be numbers.\n[line 3] in script");
}

#[test]
fn undefined_globals() {
    let (_, e) = runtime_error("print missing;");
    assert_eq!(e.message, "Undefined variable 'missing'.");

    let mut vm = VM::with_output(Vec::<u8>::new());
    match vm.interpret("missing = 1;") {
        Err(InterpretError::Runtime(e)) => {
            assert_eq!(e.message, "Undefined variable 'missing'.")
        }
        other => panic!("expected a runtime error, got {:?}", other),
    }
    // The failed assignment must not have created the global.
    assert!(vm.globals().is_empty());
    assert!(vm.interpret("print missing;").is_err());
}

#[test]
fn syntax_errors_are_all_reported() {
    let error = compile_error("print 1 +;\nprint 2;\ndef = 3;\n");

    assert_eq!(error.diagnostics.len(), 2);
    assert_eq!(
        error.to_string(),
        "[line 1] Error at ';': Expect expression.\n\
         [line 3] Error at '=': Expect variable name."
    );
}

#[test]
fn scope_errors() {
    let error = compile_error("1 + 2 = 3;");
    assert_eq!(error.diagnostics[0].message, "Invalid assignment target.");

    let error = compile_error("{ def a = a; }");
    assert_eq!(
        error.diagnostics[0].message,
        "Can't read local variable in its own initializer."
    );

    let error = compile_error("{ def a = 1; def a = 2; }");
    assert_eq!(
        error.diagnostics[0].message,
        "Already a variable with this name in this scope."
    );
}

#[test]
fn scanner_errors_have_no_location() {
    let error = compile_error("print \"oops;");

    assert_eq!(error.diagnostics[0].location, Location::Unknown);
    assert_eq!(
        error.diagnostics[0].to_string(),
        "[line 1] Error: Unterminated string."
    );
}

fn locals(count: usize) -> String {
    (0..count).map(|i| format!("def v{};", i)).collect()
}

#[test]
fn too_many_locals() {
    let error = compile_error(&format!("{{ {} }}", locals(257)));

    assert_eq!(error.diagnostics.len(), 1);
    assert_eq!(
        error.diagnostics[0].message,
        "Too many local variables in function."
    );
}

#[test]
fn full_stack_overflows() {
    // 256 locals fill the stack; reading one needs a 257th slot.
    let (_, e) = runtime_error(&format!("{{ {} print v0; }}", locals(256)));
    assert_eq!(e.message, "Stack overflow.");
}

#[test]
fn too_many_constants() {
    let at_limit: String = (0..256).map(|i| format!("{};", i)).collect();
    assert_eq!(output(&at_limit), "");

    let over: String = (0..257).map(|i| format!("{};", i)).collect();
    let error = compile_error(&over);
    assert_eq!(error.diagnostics[0].message, "Too many constants in one chunk.");
}

#[test]
fn if_else() {
    assert_eq!(
        output("if (1 < 2) print \"then\"; else print \"else\";"),
        "then\n"
    );
    assert_eq!(
        output("if (nil) print \"then\"; else print \"else\";"),
        "else\n"
    );
    assert_eq!(output("if (false) print 1; print 2;"), "2\n");
}

#[test]
fn while_loop() {
    assert_eq!(
        output("def i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
}

#[test]
fn for_loop() {
    assert_eq!(
        output("for (def i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
    assert_eq!(
        output("def sum = 0; for (def i = 1; i <= 4; i = i + 1) { sum = sum + i; } print sum;"),
        "10\n"
    );
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(
        output("print nil and undefined; print 1 and 2;"),
        "Nil\n2\n"
    );
    assert_eq!(
        output("print false or \"x\"; print 1 or undefined;"),
        "x\n1\n"
    );
}

#[test]
fn globals_persist_across_interpret_calls() {
    let mut vm = VM::with_output(Vec::<u8>::new());

    vm.interpret("def count = 1;").unwrap();
    vm.interpret("count = count + 1;").unwrap();
    assert!(vm.interpret("print count +;").is_err());
    vm.interpret("print count;").unwrap();

    assert_eq!(vm.into_output(), b"2\n");
}

#[test]
fn strings_are_interned_once() {
    let mut vm = VM::with_output(Vec::<u8>::new());

    vm.interpret("def a = \"x\" + \"y\"; def b = \"xy\";").unwrap();
    let objects = vm.heap().object_count();

    vm.interpret("print a == b; print \"x\" + \"y\";").unwrap();

    assert_eq!(vm.heap().object_count(), objects);
    assert_eq!(vm.into_output(), b"True\nxy\n");
}
