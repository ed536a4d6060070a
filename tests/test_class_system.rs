//! End-to-end tests for class definition, inheritance, config accessors,
//! mixins, statics, and member patching.

use classkit::{native, object_of, ClassSpec, ErrorKind, Kernel, Value};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_define_and_create_with_config_default() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Panel",
            ClassSpec::new().config("title", Value::from("untitled")),
        )
        .unwrap();

    let mut panel = kernel.create("Ui.Panel", &[]).unwrap();
    assert_eq!(
        panel.get_config(&mut kernel, "title").unwrap(),
        Value::from("untitled")
    );
}

#[test]
fn test_subclass_config_redeclaration_wins() {
    let mut kernel = Kernel::new();
    kernel
        .define("Ui.Base", ClassSpec::new().config("color", Value::from("blue")))
        .unwrap();
    kernel
        .define(
            "Ui.Sub",
            ClassSpec::new()
                .extend("Ui.Base")
                .config("color", Value::from("red")),
        )
        .unwrap();

    let mut base = kernel.create("Ui.Base", &[]).unwrap();
    let mut sub = kernel.create("Ui.Sub", &[]).unwrap();
    assert_eq!(
        base.get_config(&mut kernel, "color").unwrap(),
        Value::from("blue")
    );
    assert_eq!(
        sub.get_config(&mut kernel, "color").unwrap(),
        Value::from("red")
    );

    // instance overrides beat both
    let mut green = kernel
        .create("Ui.Sub", &[object_of([("color", Value::from("green"))])])
        .unwrap();
    assert_eq!(
        green.get_config(&mut kernel, "color").unwrap(),
        Value::from("green")
    );
}

#[test]
fn test_object_config_defaults_deep_merge_down_the_hierarchy() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Base",
            ClassSpec::new().config("layout", object_of([("kind", Value::from("hbox"))])),
        )
        .unwrap();
    kernel
        .define(
            "Ui.Sub",
            ClassSpec::new()
                .extend("Ui.Base")
                .config("layout", object_of([("pack", Value::from("start"))])),
        )
        .unwrap();

    let mut sub = kernel.create("Ui.Sub", &[]).unwrap();
    let layout = sub.get_config(&mut kernel, "layout").unwrap();
    let layout = layout.as_object().unwrap();
    assert_eq!(layout.get("kind"), Some(&Value::from("hbox")));
    assert_eq!(layout.get("pack"), Some(&Value::from("start")));
}

#[test]
fn test_apply_hook_vetoes_and_update_hook_fires_on_change_only() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Box",
            ClassSpec::new()
                .config("width", Value::from(10))
                .member(
                    "apply_width",
                    native(|_scope, args| match args.first() {
                        Some(Value::Int(w)) if *w < 0 => Ok(Value::Undefined),
                        Some(v) => Ok(v.clone()),
                        None => Ok(Value::Undefined),
                    }),
                )
                .member(
                    "update_width",
                    native(|scope, _args| {
                        let count = scope.data("updates").and_then(|v| v.as_int()).unwrap_or(0);
                        scope.set_data("updates", Value::from(count + 1));
                        Ok(Value::Undefined)
                    }),
                ),
        )
        .unwrap();

    let mut b = kernel.create("Ui.Box", &[]).unwrap();
    // initialization counts as the first change
    assert_eq!(b.data("updates"), Some(&Value::from(1)));

    // vetoed write: old value stands, no update fires
    let kept = b.set_config(&mut kernel, "width", Value::from(-5)).unwrap();
    assert_eq!(kept, Value::from(10));
    assert_eq!(b.data("updates"), Some(&Value::from(1)));

    // same-value write: stored but no update
    b.set_config(&mut kernel, "width", Value::from(10)).unwrap();
    assert_eq!(b.data("updates"), Some(&Value::from(1)));

    b.set_config(&mut kernel, "width", Value::from(42)).unwrap();
    assert_eq!(b.data("updates"), Some(&Value::from(2)));
    assert_eq!(
        b.get_config(&mut kernel, "width").unwrap(),
        Value::from(42)
    );
}

#[test]
fn test_user_getter_shadows_synthesized_accessor() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Label",
            ClassSpec::new()
                .config("title", Value::from("default"))
                .member(
                    "get_title",
                    native(|scope, _args| {
                        // reading the property from inside its own getter
                        // falls through to the stored value
                        let inner = scope.get("title")?;
                        Ok(Value::from(format!(
                            "<{}>",
                            inner.as_str().unwrap_or("")
                        )))
                    }),
                ),
        )
        .unwrap();

    let mut label = kernel.create("Ui.Label", &[]).unwrap();
    assert_eq!(
        label.get_config(&mut kernel, "title").unwrap(),
        Value::from("<default>")
    );
}

#[test]
fn test_constructor_receives_all_arguments() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Tag",
            ClassSpec::new().member(
                "constructor",
                native(|scope, args| {
                    if let Some(tag) = args.get(1) {
                        scope.set_data("tag", tag.clone());
                    }
                    Ok(Value::Undefined)
                }),
            ),
        )
        .unwrap();

    let tagged = kernel
        .create("Ui.Tag", &[Value::object(), Value::from("primary")])
        .unwrap();
    assert_eq!(tagged.data("tag"), Some(&Value::from("primary")));
}

#[test]
fn test_inherited_member_and_call_parent() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Base",
            ClassSpec::new().member("describe", native(|_, _| Ok(Value::from("base")))),
        )
        .unwrap();
    kernel
        .define(
            "Ui.Sub",
            ClassSpec::new().extend("Ui.Base").member(
                "describe",
                native(|scope, args| {
                    let parent = scope.call_parent(args)?;
                    Ok(Value::from(format!(
                        "{}+sub",
                        parent.as_str().unwrap_or("")
                    )))
                }),
            ),
        )
        .unwrap();
    // a class that only inherits still dispatches to the base implementation
    kernel
        .define("Ui.Leaf", ClassSpec::new().extend("Ui.Sub"))
        .unwrap();

    let mut leaf = kernel.create("Ui.Leaf", &[]).unwrap();
    assert_eq!(
        leaf.call(&mut kernel, "describe", &[]).unwrap(),
        Value::from("base+sub")
    );
}

#[test]
fn test_override_patches_in_place_and_call_parent_reaches_previous() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Button",
            ClassSpec::new().member("render", native(|_, _| Ok(Value::from("button")))),
        )
        .unwrap();
    let mut before = kernel.create("Ui.Button", &[]).unwrap();

    kernel
        .define(
            "Patch.ButtonRender",
            ClassSpec::new().override_of("Ui.Button").member(
                "render",
                native(|scope, args| {
                    let previous = scope.call_parent(args)?;
                    Ok(Value::from(format!(
                        "{}+patched",
                        previous.as_str().unwrap_or("")
                    )))
                }),
            ),
        )
        .unwrap();

    // existing instances see the patch too: dispatch goes through the
    // shared template
    assert_eq!(
        before.call(&mut kernel, "render", &[]).unwrap(),
        Value::from("button+patched")
    );
    let mut after = kernel.create("Ui.Button", &[]).unwrap();
    assert_eq!(
        after.call(&mut kernel, "render", &[]).unwrap(),
        Value::from("button+patched")
    );
}

#[test]
fn test_call_super_skips_the_patch_chain() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Base",
            ClassSpec::new().member("render", native(|_, _| Ok(Value::from("base")))),
        )
        .unwrap();
    kernel
        .define(
            "Ui.Sub",
            ClassSpec::new()
                .extend("Ui.Base")
                .member("render", native(|_, _| Ok(Value::from("sub")))),
        )
        .unwrap();
    kernel
        .define(
            "Patch.SubRender",
            ClassSpec::new().override_of("Ui.Sub").member(
                "render",
                native(|scope, args| {
                    let original = scope.call_super(args)?;
                    Ok(Value::from(format!(
                        "{}!",
                        original.as_str().unwrap_or("")
                    )))
                }),
            ),
        )
        .unwrap();

    let mut sub = kernel.create("Ui.Sub", &[]).unwrap();
    // call_super lands on Ui.Sub's original implementation, not Ui.Base's
    assert_eq!(
        sub.call(&mut kernel, "render", &[]).unwrap(),
        Value::from("sub!")
    );
}

#[test]
fn test_override_of_undefined_target_applies_when_it_registers() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Patch.Later",
            ClassSpec::new().override_of("Ui.Late").member(
                "ping",
                native(|_, _| Ok(Value::from("patched"))),
            ),
        )
        .unwrap();
    assert!(!kernel.is_created("Ui.Late"));

    kernel
        .define(
            "Ui.Late",
            ClassSpec::new().member("ping", native(|_, _| Ok(Value::from("original")))),
        )
        .unwrap();

    let mut late = kernel.create("Ui.Late", &[]).unwrap();
    assert_eq!(
        late.call(&mut kernel, "ping", &[]).unwrap(),
        Value::from("patched")
    );
}

#[test]
fn test_mixin_contributes_members_without_shadowing() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Mix.Focusable",
            ClassSpec::new()
                .member("focus", native(|_, _| Ok(Value::from("focused"))))
                .member("blur", native(|_, _| Ok(Value::from("mixin-blur")))),
        )
        .unwrap();
    kernel
        .define(
            "Ui.Field",
            ClassSpec::new()
                .mixin("focusable", "Mix.Focusable")
                .member("blur", native(|_, _| Ok(Value::from("own-blur")))),
        )
        .unwrap();

    let mut field = kernel.create("Ui.Field", &[]).unwrap();
    assert_eq!(
        field.call(&mut kernel, "focus", &[]).unwrap(),
        Value::from("focused")
    );
    // the class's own member wins over the mixin's
    assert_eq!(
        field.call(&mut kernel, "blur", &[]).unwrap(),
        Value::from("own-blur")
    );
    // mixin slots keep the mixin as declaring owner
    let ty = kernel.get("Ui.Field").unwrap();
    assert_eq!(ty.find_member("focus").unwrap().owner, "Mix.Focusable");
}

#[test]
fn test_mixed_in_hook_runs_against_the_target() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Mix.Observable",
            ClassSpec::new()
                .member("fire", native(|_, _| Ok(Value::Undefined)))
                .on_mixed_in(|_kernel, target| {
                    target.set_static("observable", Value::from(true));
                    Ok(())
                }),
        )
        .unwrap();
    kernel
        .define(
            "Ui.Store",
            ClassSpec::new().mixin("observable", "Mix.Observable"),
        )
        .unwrap();

    let ty = kernel.get("Ui.Store").unwrap();
    assert_eq!(ty.static_value("observable"), Some(Value::from(true)));
}

#[test]
fn test_inheritable_statics_flow_down_plain_statics_do_not() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Widget",
            ClassSpec::new()
                .static_value("kind", Value::from("widget"))
                .inheritable_static("family", Value::from("ui")),
        )
        .unwrap();
    kernel
        .define("Ui.Chart", ClassSpec::new().extend("Ui.Widget"))
        .unwrap();

    let chart = kernel.get("Ui.Chart").unwrap();
    assert_eq!(chart.static_value("family"), Some(Value::from("ui")));
    assert_eq!(chart.static_value("kind"), None);
}

#[test]
fn test_singleton_is_instantiated_at_definition() {
    let mut kernel = Kernel::new();
    let pings = Rc::new(Cell::new(0));
    let pings_in = pings.clone();
    kernel
        .define(
            "Ns.Registry",
            ClassSpec::new()
                .singleton()
                .config("limit", Value::from(8))
                .member(
                    "ping",
                    native(move |_, _| {
                        pings_in.set(pings_in.get() + 1);
                        Ok(Value::Undefined)
                    }),
                ),
        )
        .unwrap();

    let shared = kernel.singleton("Ns.Registry").unwrap();
    shared.borrow_mut().call(&mut kernel, "ping", &[]).unwrap();
    assert_eq!(pings.get(), 1);
    assert_eq!(
        shared
            .borrow_mut()
            .get_config(&mut kernel, "limit")
            .unwrap(),
        Value::from(8)
    );

    // singletons cannot be created directly
    assert!(kernel.create("Ns.Registry", &[]).is_err());
}

#[test]
fn test_aliases_and_alternate_names_resolve() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.button.Split",
            ClassSpec::new()
                .alias("button.split")
                .alternate("Ui.SplitButton")
                .config("label", Value::from("ok")),
        )
        .unwrap();

    let by_alias = kernel.create_by_alias("button.split", &[]).unwrap();
    assert_eq!(by_alias.class_name(), "Ui.button.Split");

    let by_alternate = kernel.create("Ui.SplitButton", &[]).unwrap();
    assert_eq!(by_alternate.class_name(), "Ui.button.Split");

    assert!(kernel.create_by_alias("button.nope", &[]).is_err());
}

#[test]
fn test_on_created_for_fires_immediately_or_when_registered() {
    let mut kernel = Kernel::new();
    let seen = Rc::new(Cell::new(0));

    kernel.define("Ui.Now", ClassSpec::new()).unwrap();
    let seen_now = seen.clone();
    kernel.on_created_for("Ui.Now", move |_, _| seen_now.set(seen_now.get() + 1));
    assert_eq!(seen.get(), 1);

    let seen_later = seen.clone();
    kernel.on_created_for("Ui.Later", move |_, ty| {
        assert_eq!(ty.name(), "Ui.Later");
        seen_later.set(seen_later.get() + 10);
    });
    assert_eq!(seen.get(), 1);
    kernel.define("Ui.Later", ClassSpec::new()).unwrap();
    assert_eq!(seen.get(), 11);
}

#[test]
fn test_watcher_sees_every_registration() {
    let mut kernel = Kernel::new();
    let count = Rc::new(Cell::new(0));
    let count_in = count.clone();
    kernel.on_created(move |_, _| count_in.set(count_in.get() + 1));

    kernel.define("Ns.A", ClassSpec::new()).unwrap();
    kernel.define("Ns.B", ClassSpec::new()).unwrap();
    assert_eq!(count.get(), 2);
}

#[test]
fn test_watcher_sees_types_defined_by_another_watcher() {
    let mut kernel = Kernel::new();

    // the first watcher reacts to Ns.A by defining Ns.B
    kernel.on_created(|kernel, ty| {
        if ty.name() == "Ns.A" {
            kernel.define("Ns.B", ClassSpec::new()).unwrap();
        }
    });
    let names = Rc::new(std::cell::RefCell::new(Vec::new()));
    let names_in = names.clone();
    kernel.on_created(move |_, ty| names_in.borrow_mut().push(ty.name().to_string()));

    kernel.define("Ns.A", ClassSpec::new()).unwrap();
    assert!(kernel.is_created("Ns.B"));
    assert_eq!(*names.borrow(), vec!["Ns.A", "Ns.B"]);
}

#[test]
fn test_two_sequential_overrides_chain_through_call_parent() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Button",
            ClassSpec::new().member("render", native(|_, _| Ok(Value::from("button")))),
        )
        .unwrap();
    kernel
        .define(
            "Patch.First",
            ClassSpec::new().override_of("Ui.Button").member(
                "render",
                native(|scope, args| {
                    let previous = scope.call_parent(args)?;
                    Ok(Value::from(format!(
                        "{}+one",
                        previous.as_str().unwrap_or("")
                    )))
                }),
            ),
        )
        .unwrap();
    kernel
        .define(
            "Patch.Second",
            ClassSpec::new().override_of("Ui.Button").member(
                "render",
                native(|scope, args| {
                    let previous = scope.call_parent(args)?;
                    Ok(Value::from(format!(
                        "{}+two",
                        previous.as_str().unwrap_or("")
                    )))
                }),
            ),
        )
        .unwrap();

    // dispatch enters the last patch and call_parent walks the whole chain
    // down to the original implementation
    let mut button = kernel.create("Ui.Button", &[]).unwrap();
    assert_eq!(
        button.call(&mut kernel, "render", &[]).unwrap(),
        Value::from("button+one+two")
    );
}

#[test]
fn test_subclass_reads_and_writes_inherited_config_through_accessors() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Draw.Base",
            ClassSpec::new().config("color", Value::from("blue")).member(
                "paint",
                native(|scope, _| {
                    let color = scope.get("color")?;
                    Ok(Value::from(format!(
                        "painting {}",
                        color.as_str().unwrap_or("")
                    )))
                }),
            ),
        )
        .unwrap();
    kernel
        .define(
            "Draw.Sub",
            ClassSpec::new()
                .extend("Draw.Base")
                .config("color", Value::from("red")),
        )
        .unwrap();

    let mut sub = kernel.create("Draw.Sub", &[]).unwrap();
    // the inherited member reads the subclass's merged default
    assert_eq!(
        sub.call(&mut kernel, "paint", &[]).unwrap(),
        Value::from("painting red")
    );

    sub.set_config(&mut kernel, "color", Value::from("green"))
        .unwrap();
    assert_eq!(
        sub.get_config(&mut kernel, "color").unwrap(),
        Value::from("green")
    );
    assert_eq!(
        sub.call(&mut kernel, "paint", &[]).unwrap(),
        Value::from("painting green")
    );
}

#[test]
fn test_missing_parent_with_loader_disabled_is_an_error() {
    let mut kernel = Kernel::new();
    kernel.set_loader_enabled(false);

    let err = kernel
        .define("Ui.Panel", ClassSpec::new().extend("Ui.Container"))
        .unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::UnresolvedDependency { .. }
    ));
    assert!(!kernel.is_created("Ui.Panel"));
}

#[test]
fn test_malformed_names_and_redefinition_are_rejected() {
    let mut kernel = Kernel::new();
    assert!(kernel.define("Ui..Broken", ClassSpec::new()).is_err());
    assert!(kernel.define("Ui.bad-name", ClassSpec::new()).is_err());

    kernel.define("Ui.Once", ClassSpec::new()).unwrap();
    let err = kernel.define("Ui.Once", ClassSpec::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedSpec { .. }));
}

#[test]
fn test_no_such_member_and_no_ancestor_errors() {
    let mut kernel = Kernel::new();
    kernel
        .define(
            "Ui.Solo",
            ClassSpec::new().member("alone", native(|scope, args| scope.call_parent(args))),
        )
        .unwrap();

    let mut solo = kernel.create("Ui.Solo", &[]).unwrap();
    let err = solo.call(&mut kernel, "missing", &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NoSuchMember { .. }));

    let err = solo.call(&mut kernel, "alone", &[]).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::NoAncestorImplementation { .. }
    ));
}

#[test]
fn test_undeclared_create_keys_become_data_members() {
    let mut kernel = Kernel::new();
    kernel
        .define("Ui.Plain", ClassSpec::new().config("known", Value::from(1)))
        .unwrap();

    let plain = kernel
        .create(
            "Ui.Plain",
            &[object_of([
                ("known", Value::from(2)),
                ("extra", Value::from("loose")),
            ])],
        )
        .unwrap();
    assert_eq!(plain.data("extra"), Some(&Value::from("loose")));
    assert_eq!(plain.data("known"), None);
}
