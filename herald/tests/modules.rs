//! Module derivation through the runtime catalog.

use herald::{
    ModuleError, Runtime,
    module::{CONSTRUCTOR, INITIALIZE, Overrides, merge},
};
use serde_json::{Value, json};
use std::sync::Arc;

mod common;
use common::{tagged, wrapping};

#[test]
fn test_override_resolution_a_b_c() {
    let runtime = Runtime::new();
    let a = runtime.derive_module("chain.A", None, tagged("A")).unwrap();
    let b = runtime.derive_module("chain.B", Some(&a), wrapping("B")).unwrap();
    let c = runtime.derive_module("chain.C", Some(&b), wrapping("C")).unwrap();
    let d = runtime.derive_module("chain.D", Some(&c), Overrides::new()).unwrap();

    assert_eq!(a.instantiate().invoke("describe", &[]).unwrap(), json!("A"));
    assert_eq!(b.instantiate().invoke("describe", &[]).unwrap(), json!("B<A>"));
    assert_eq!(c.instantiate().invoke("describe", &[]).unwrap(), json!("C<B<A>>"));
    assert_eq!(d.instantiate().invoke("describe", &[]).unwrap(), json!("C<B<A>>"));

    let entry = c.method("describe").unwrap();
    assert_eq!(entry.owner(), "chain.C");
    assert_eq!(entry.base().unwrap().owner(), "chain.B");
    assert_eq!(entry.base().unwrap().base().unwrap().owner(), "chain.A");
    assert!(entry.base().unwrap().base().unwrap().base().is_none());
}

#[test]
fn test_inherited_method_called_from_override() {
    let runtime = Runtime::new();
    let a = runtime
        .derive_module(
            "mix.A",
            None,
            Overrides::new()
                .method("f", |_, _| Ok(json!("A")))
                .method("g", |_, _| Ok(json!("g@A"))),
        )
        .unwrap();
    let b = runtime
        .derive_module(
            "mix.B",
            Some(&a),
            Overrides::new().method("f", |call, args| {
                let inner = call.invoke_base(args)?;
                Ok(json!(format!("B<{}>", inner.as_str().unwrap_or_default())))
            }),
        )
        .unwrap();
    let c = runtime
        .derive_module(
            "mix.C",
            Some(&b),
            Overrides::new().method("g", |call, args| {
                let base = call.invoke_base(args)?;
                let f = call.invoke("f", &[])?;
                Ok(json!(format!(
                    "C[{}|{}]",
                    base.as_str().unwrap_or_default(),
                    f.as_str().unwrap_or_default()
                )))
            }),
        )
        .unwrap();

    assert!(Arc::ptr_eq(c.method("f").unwrap(), b.method("f").unwrap()));
    assert_eq!(c.method("g").unwrap().base().unwrap().owner(), "mix.A");
    assert_eq!(c.instantiate().invoke("g", &[]).unwrap(), json!("C[g@A|B<A>]"));
}

#[test]
fn test_base_call_without_base_fails() {
    let runtime = Runtime::new();
    let lonely = runtime.derive_module("chain.Lonely", None, wrapping("L")).unwrap();

    let err = lonely.instantiate().invoke("describe", &[]).unwrap_err();
    assert!(matches!(
        err,
        ModuleError::NoSuperImplementation { ref module, ref method }
            if module == "chain.Lonely" && method == "describe"
    ));
}

#[test]
fn test_three_level_config_isolation() {
    let runtime = Runtime::new();
    let base = runtime
        .derive_module(
            "ui.Widget",
            None,
            Overrides::new().defaults(json!({ "size": { "w": 10, "h": 10 }, "tags": ["widget"] })),
        )
        .unwrap();
    let button = runtime
        .derive_module(
            "ui.Button",
            Some(&base),
            Overrides::new().defaults(json!({ "size": { "h": 4 }, "label": "ok" })),
        )
        .unwrap();
    let danger = runtime
        .derive_module(
            "ui.DangerButton",
            Some(&button),
            Overrides::new().defaults(json!({ "label": "delete", "tags": ["danger"] })),
        )
        .unwrap();

    let mut first = danger.construct(Some(&json!({ "size": { "w": 99 } })), &[]).unwrap();
    let second = danger.construct(None, &[]).unwrap();
    first.config_mut()["size"]["h"] = json!(0);

    assert_eq!(
        first.config(),
        &json!({ "size": { "w": 99, "h": 0 }, "tags": ["danger"], "label": "delete" })
    );
    assert_eq!(
        second.config(),
        &json!({ "size": { "w": 10, "h": 4 }, "tags": ["danger"], "label": "delete" })
    );
    assert_eq!(button.defaults(), &json!({ "size": { "w": 10, "h": 4 }, "tags": ["widget"], "label": "ok" }));
    assert_eq!(base.defaults(), &json!({ "size": { "w": 10, "h": 10 }, "tags": ["widget"] }));
}

#[test]
fn test_initialize_overrides_chain() {
    let runtime = Runtime::new();
    let base = runtime
        .derive_module(
            "app.Model",
            None,
            Overrides::new().method(INITIALIZE, |call, args| {
                call.set("id", args.first().cloned().unwrap_or(Value::Null));
                Ok(Value::Null)
            }),
        )
        .unwrap();
    let user = runtime
        .derive_module(
            "app.User",
            Some(&base),
            Overrides::new().method(INITIALIZE, |call, args| {
                call.invoke_base(args)?;
                call.set("kind", json!("user"));
                Ok(Value::Null)
            }),
        )
        .unwrap();

    let instance = user.construct(None, &[json!(7)]).unwrap();
    assert_eq!(instance.get("id"), Some(&json!(7)));
    assert_eq!(instance.get("kind"), Some(&json!("user")));
    assert!(instance.is_a(&base));

    let prototype = user.instantiate();
    assert!(!prototype.is_initialized());
    assert!(prototype.state().is_empty());
}

#[test]
fn test_catalog_errors() {
    let runtime = Runtime::builder().namespace("app").build().unwrap();

    let reserved = runtime
        .derive_module("app.Bad", None, Overrides::new().method(CONSTRUCTOR, |_, _| Ok(Value::Null)))
        .unwrap_err();
    assert!(matches!(reserved, ModuleError::ReservedName(_)));
    assert!(runtime.module("app.Bad").is_none());

    let invalid = runtime.derive_module("a.b.c", None, Overrides::new()).unwrap_err();
    assert!(matches!(invalid, ModuleError::InvalidName(_)));

    runtime.derive_module("app.Good", None, Overrides::new()).unwrap();
    let duplicate = runtime.derive_module("app.Good", None, Overrides::new()).unwrap_err();
    assert_eq!(duplicate.to_string(), "module `app.Good` is already defined");

    let extended = runtime.extend_module("lib.Better", "app.Good", Overrides::new()).unwrap();
    assert_eq!(extended.base().unwrap().qualified_name(), "app.Good");
    assert_eq!(runtime.namespaces(), vec!["app", "lib"]);
}

#[test]
fn test_merge_helper() {
    let merged = merge::merged(&json!({ "a": { "b": 1 } }), &json!({ "a": { "c": 2 } }));
    assert_eq!(merged, json!({ "a": { "b": 1, "c": 2 } }));
}
