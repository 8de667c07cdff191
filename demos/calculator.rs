//! Demo harness: a small calculator suite run through the trellis CLI.
//!
//! ```text
//! cargo run --example calculator -- execute -v
//! cargo run --example calculator -- discover --select-package demo.calc
//! cargo run --example calculator -- execute --exclude-tag slow --details tree
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use trellis::Fallible;
use trellis::assertions::{assert_equals, assert_true, assume_true};
use trellis::extension::{
    AfterEachCallback, BeforeEachCallback, Extension, ExtensionContext, ExtensionDecl, ParameterContext,
    ParameterResolver, Registrar, TestInfo, Visibility,
};
use trellis::model::{Catalog, DynamicTest, Marker, Parameter, TestClass, TestMethod, Value};

#[derive(Default)]
struct Calculator {
    memory: Cell<i64>,
}

impl Calculator {
    fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    fn divide(&self, a: i64, b: i64) -> Option<i64> {
        a.checked_div(b)
    }

    fn store(&self, value: i64) {
        self.memory.set(value);
    }
}

struct Memory {
    calculator: Rc<Calculator>,
    history: RefCell<Vec<i64>>,
}

/// Logs how long each test took, keeping the start time in the context store.
#[derive(Default)]
struct Timing;

impl BeforeEachCallback for Timing {
    fn before_each(&self, context: &ExtensionContext) -> Fallible {
        context.store("started", Rc::new(Instant::now()), Visibility::Local)?;
        Ok(())
    }
}

impl AfterEachCallback for Timing {
    fn after_each(&self, context: &ExtensionContext) -> Fallible {
        if let Some(started) = context.get_as::<Instant>("started")? {
            tracing::info!(test = context.display_name(), elapsed = ?started.elapsed(), "test timed");
        }
        Ok(())
    }
}

impl Extension for Timing {
    fn register(self: Rc<Self>, registrar: &mut Registrar<'_>) {
        registrar.before_each(self.clone()).after_each(self);
    }
}

/// Supplies `i64` parameters named `seed`.
#[derive(Default)]
struct Seeds;

impl ParameterResolver for Seeds {
    fn supports(&self, parameter: &ParameterContext<'_>, _context: &ExtensionContext) -> Fallible<bool> {
        Ok(parameter.type_name() == "i64" && parameter.parameter.name == "seed")
    }

    fn resolve(&self, _parameter: &ParameterContext<'_>, _context: &ExtensionContext) -> Fallible<Value> {
        Ok(Rc::new(21_i64))
    }
}

impl Extension for Seeds {
    fn register(self: Rc<Self>, registrar: &mut Registrar<'_>) {
        registrar.parameter_resolver(self);
    }
}

fn calculator_suite() -> TestClass {
    TestClass::builder("demo.calc.CalculatorTests")
        .display_name("Calculator")
        .instance_default::<Calculator>()
        .extend_with(ExtensionDecl::of::<Timing>())
        .extend_with(ExtensionDecl::of::<Seeds>())
        .before_all("connect", || {
            tracing::debug!("calculator suite starting");
            Ok(())
        })
        .test("adds", |calc: &Calculator| assert_equals(4, calc.add(2, 2)))
        .test("divides", |calc: &Calculator| assert_equals(Some(3), calc.divide(9, 3)))
        .test("rejects division by zero", |calc: &Calculator| {
            assert_true(calc.divide(1, 0).is_none(), "dividing by zero yields nothing")
        })
        .method(
            TestMethod::on::<Calculator>("doubles seed", |calc, args| {
                let seed = args
                    .first()
                    .and_then(|value| value.downcast_ref::<i64>())
                    .copied()
                    .unwrap_or_default();
                assert_equals(42, calc.add(seed, seed))
            })
            .param(Parameter::new("seed", "i64"))
            .marker(Marker::Test),
        )
        .method(
            TestMethod::on::<Calculator>("reports itself", |_, args| {
                let info = args.first().and_then(|value| value.downcast_ref::<TestInfo>());
                assert_true(
                    info.is_some_and(|info| info.display_name == "reports itself(TestInfo)"),
                    "TestInfo carries the display name",
                )
            })
            .param(Parameter::new("info", "TestInfo"))
            .marker(Marker::Test),
        )
        .method(
            TestMethod::on::<Calculator>("large sums", |calc, _| {
                assume_true(cfg!(target_pointer_width = "64"), "needs 64-bit words")?;
                assert_equals(i64::MAX, calc.add(i64::MAX - 1, 1))
            })
            .tag("slow")
            .marker(Marker::Test),
        )
        .method(
            TestMethod::on::<Calculator>("square roots", |_, _| Ok(()))
                .disabled("not implemented yet")
                .marker(Marker::Test),
        )
        .test_factory("sums table", |calc: &Calculator| {
            let calc = Rc::new(Calculator {
                memory: Cell::new(calc.memory.get()),
            });
            Ok([(1, 1, 2), (2, 3, 5), (10, -4, 6)]
                .into_iter()
                .map(|(a, b, expected)| {
                    let calc = Rc::clone(&calc);
                    DynamicTest::new(format!("{a} + {b} = {expected}"), move || {
                        assert_equals(expected, calc.add(a, b))
                    })
                })
                .collect())
        })
        .nested(
            TestClass::builder("demo.calc.CalculatorTests$MemoryTests")
                .display_name("Memory")
                .marker(Marker::Nested)
                .instance_factory(|outer| {
                    let calculator = outer
                        .and_then(|outer| Rc::clone(outer).downcast::<Calculator>().ok())
                        .ok_or_else(|| trellis::Failure::configuration("Memory needs the enclosing Calculator"))?;
                    Ok(Rc::new(Memory {
                        calculator,
                        history: RefCell::new(Vec::new()),
                    }))
                })
                .before_each("store seven", |memory: &Memory| {
                    memory.calculator.store(7);
                    memory.history.borrow_mut().push(7);
                    Ok(())
                })
                .test("recalls", |memory: &Memory| {
                    assert_equals(7, memory.calculator.memory.get())?;
                    assert_equals(vec![7], memory.history.borrow().clone())
                })
                .build(),
        )
        .build()
}

fn main() {
    // Initialize structured logging with env-based filter, defaulting to info
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    trellis::cli::run(Catalog::new().with(calculator_suite()));
}
