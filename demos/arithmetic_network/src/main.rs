//! Builds the four-operation arithmetic network used throughout the
//! library's test suite, compiles it, and runs it twice: once over the
//! full input set, once specialized against a narrower set of supplied
//! inputs and a single requested output.

use compute_core::{Operation, PortSpec, Value, ValueMap};
use compute_network::{ComputeMethod, Network};

fn sub(args: &[Value], _attrs: &compute_core::AttrMap) -> Result<Vec<Value>, compute_core::OperationError> {
    Ok(vec![Value::from(args[0].as_f64()? - args[1].as_f64()?)])
}

fn mul(args: &[Value], _attrs: &compute_core::AttrMap) -> Result<Vec<Value>, compute_core::OperationError> {
    Ok(vec![Value::from(args[0].as_f64()? * args[1].as_f64()?)])
}

fn div(args: &[Value], _attrs: &compute_core::AttrMap) -> Result<Vec<Value>, compute_core::OperationError> {
    Ok(vec![Value::from(args[0].as_f64()? / args[1].as_f64()?)])
}

fn pow(args: &[Value], _attrs: &compute_core::AttrMap) -> Result<Vec<Value>, compute_core::OperationError> {
    Ok(vec![Value::from(args[0].as_f64()?.powf(args[1].as_f64()?))])
}

fn build_network() -> Network {
    let mut net = Network::new();
    net.add_operation(
        Operation::new(
            "op_sub",
            vec![PortSpec::required("a"), PortSpec::required("b")],
            vec!["a_minus_b".into()],
            sub,
        )
        .unwrap(),
    )
    .unwrap();
    net.add_operation(
        Operation::new(
            "op_mul",
            vec![PortSpec::required("x"), PortSpec::required("y")],
            vec!["p".into()],
            mul,
        )
        .unwrap(),
    )
    .unwrap();
    net.add_operation(
        Operation::new(
            "op_div",
            vec![PortSpec::required("a_minus_b"), PortSpec::required("c")],
            vec!["a_minus_b_div_c".into()],
            div,
        )
        .unwrap(),
    )
    .unwrap();
    net.add_operation(
        Operation::new(
            "op_pow",
            vec![PortSpec::required("a_minus_b_div_c"), PortSpec::required("p")],
            vec!["a_minus_b_div_c_pow_p".into()],
            pow,
        )
        .unwrap(),
    )
    .unwrap();
    net
}

fn main() {
    env_logger::init();

    let mut net = build_network();
    net.compile(true).unwrap();
    println!("compiled plan: {} steps", net.ordered_steps().len());

    let mut inputs = ValueMap::default();
    inputs.insert("a".into(), Value::from(0.3));
    inputs.insert("b".into(), Value::from(4.0));
    inputs.insert("c".into(), Value::from(11.0));
    inputs.insert("x".into(), Value::from(7.0));
    inputs.insert("y".into(), Value::from(-2.0));

    let result = net.call(inputs, &[], ComputeMethod::Sequential).unwrap();
    println!("full run:");
    for (name, value) in &result {
        println!("  {name} = {value}");
    }
    for (step, seconds) in net.perf_register() {
        println!("  [{step}] {:.9}s", seconds);
    }

    // Specialized run: supply `a_minus_b` directly, request only the
    // final power, and watch `op_sub` disappear from the plan.
    let mut narrowed = ValueMap::default();
    narrowed.insert("a_minus_b".into(), Value::from(-3.7));
    narrowed.insert("c".into(), Value::from(11.0));
    narrowed.insert("x".into(), Value::from(7.0));
    narrowed.insert("y".into(), Value::from(-2.0));

    let specialized = net
        .call(
            narrowed,
            &["a_minus_b_div_c_pow_p".to_string()],
            ComputeMethod::Sequential,
        )
        .unwrap();
    println!("specialized run:");
    for (name, value) in &specialized {
        println!("  {name} = {value}");
    }
}
