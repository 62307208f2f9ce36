//! Java source fixtures

use codegraph_pdg::features::syntax::{JavaAdapter, Procedure, SyntaxAdapter};
use codegraph_pdg::pipeline::{PdgPipeline, ProcedureAnalysis};

/// Nested sum loop over an array, the canonical CLI demo
pub const NESTED_LOOPS: &str = r#"public class NestedLoops {
    public static int nestedLoops(int[] arr) {
        int sum = 0;
        for (int i = 0; i < arr.length; i++) {
            int value = arr[i];
            sum = sum + value;
        }
        return sum;
    }
}
"#;

/// A class whose middle method has a `break` outside any loop
pub const ONE_MALFORMED_METHOD: &str = r#"class Mixed {
    int first(int a) {
        int b = a + 1;
        return b;
    }

    void broken() {
        break;
    }

    int last(int c) {
        if (c > 0) {
            return c;
        }
        return -c;
    }
}
"#;

pub const ACCOUNT: &str = r#"class Account {
    private int balance;
    private int operations;

    Account(int initial) {
        balance = initial;
    }

    void deposit(int amount) {
        if (amount <= 0) {
            throw new IllegalArgumentException("amount");
        }
        this.balance += amount;
        operations++;
    }

    int drain() {
        int drained = 0;
        try {
            check();
            drained = balance;
            balance = 0;
        } catch (IllegalStateException e) {
            log(e);
        } finally {
            operations++;
        }
        return drained;
    }
}
"#;

/// Wrap a method body in `class T { void m(int n) { ... } }`
pub fn fixture_method(body: &str) -> String {
    format!("class T {{\n    void m(int n) {{\n{}\n    }}\n}}\n", body)
}

/// Java source with `count` independent methods
pub fn fixture_n_methods(count: usize) -> String {
    let methods: String = (0..count)
        .map(|i| {
            format!(
                "    int m{i}(int a) {{\n        int s = 0;\n        while (a > 0) {{ s = s + a; a--; }}\n        return s;\n    }}\n"
            )
        })
        .collect();
    format!("class Many {{\n{}}}\n", methods)
}

pub fn lower_java(source: &str) -> Vec<Procedure> {
    JavaAdapter::new()
        .lower_source(source, "Fixture.java")
        .expect("fixture should parse")
}

/// Analyze every procedure of a Java source with the default pipeline
pub fn analyze_java(source: &str) -> Vec<ProcedureAnalysis> {
    let pipeline = PdgPipeline::default();
    lower_java(source)
        .iter()
        .map(|p| pipeline.analyze_procedure(p).expect("procedure should analyze"))
        .collect()
}

/// Analyze the single method of `fixture_method(body)`
pub fn analyze_body(body: &str) -> ProcedureAnalysis {
    let mut analyses = analyze_java(&fixture_method(body));
    assert_eq!(analyses.len(), 1, "expected exactly one procedure");
    analyses.remove(0)
}
