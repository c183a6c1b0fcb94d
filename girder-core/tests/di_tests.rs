// Tests for the typed dependency graph

use girder_core::{Container, Error, Owned, RegistryBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Debug, PartialEq)]
struct A {
    seed: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct B {
    a: Arc<A>,
}

#[derive(Clone, Debug, PartialEq)]
struct C {
    b: B,
    a: Arc<A>,
}

#[derive(Debug, PartialEq)]
struct D {
    c: Arc<C>,
    b: B,
    a: A,
}

fn chain(built: Arc<AtomicUsize>) -> Container {
    let builder = RegistryBuilder::new();
    builder
        .register(move || {
            built.fetch_add(1, Ordering::SeqCst);
            A { seed: 7 }
        })
        .unwrap();
    builder.register(|a: Arc<A>| B { a }).unwrap();
    builder
        .register(|b: Owned<B>, a: Arc<A>| C { b: b.into_inner(), a })
        .unwrap();
    builder
        .register_shared(|c: Arc<C>, b: Owned<B>, a: Owned<A>| {
            Arc::new(D {
                c,
                b: b.into_inner(),
                a: a.into_inner(),
            })
        })
        .unwrap();
    builder.build().unwrap()
}

#[test]
fn test_four_level_chain_resolves_every_field() {
    let built = Arc::new(AtomicUsize::new(0));
    let container = chain(built.clone());

    let d = container.resolve::<D>().unwrap();

    assert_eq!(d.a, A { seed: 7 });
    assert_eq!(*d.b.a, A { seed: 7 });
    assert_eq!(*d.c.a, A { seed: 7 });
    assert_eq!(*d.c.b.a, A { seed: 7 });
    assert_eq!(d.c.b, d.b);

    // A is a diamond below D; it is built once per resolution
    assert_eq!(built.load(Ordering::SeqCst), 1);

    container.resolve::<D>().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn test_pointer_consumers_of_value_producer_get_their_own_cell() {
    let d = chain(Arc::default()).resolve::<D>().unwrap();
    assert_eq!(d.b.a, d.c.a);
    assert!(!Arc::ptr_eq(&d.b.a, &d.c.a));
}

#[test]
fn test_shared_producer_is_shared_within_one_resolution() {
    struct Pool {
        size: usize,
    }

    #[derive(Clone)]
    struct Repo {
        pool: Arc<Pool>,
    }

    #[derive(Clone)]
    struct Service {
        repo: Repo,
        pool: Arc<Pool>,
    }

    let builder = RegistryBuilder::new();
    builder.register_shared(|| Arc::new(Pool { size: 4 })).unwrap();
    builder.register(|pool: Arc<Pool>| Repo { pool }).unwrap();
    builder
        .register(|repo: Owned<Repo>, pool: Arc<Pool>| Service {
            repo: repo.into_inner(),
            pool,
        })
        .unwrap();
    let container = builder.build().unwrap();

    let first = container.resolve::<Service>().unwrap();
    assert_eq!(first.pool.size, 4);
    assert!(Arc::ptr_eq(&first.pool, &first.repo.pool));

    let second = container.resolve::<Service>().unwrap();
    assert!(!Arc::ptr_eq(&first.pool, &second.pool));
}

#[test]
fn test_value_consumer_receives_a_copy_of_a_literal() {
    #[derive(Clone)]
    struct Settings {
        name: String,
    }

    #[derive(Clone)]
    struct Greeter {
        settings: Settings,
    }

    let builder = RegistryBuilder::new();
    builder
        .register_value(Settings {
            name: "girder".into(),
        })
        .unwrap();
    builder
        .register(|settings: Owned<Settings>| Greeter {
            settings: settings.into_inner(),
        })
        .unwrap();
    let container = builder.build().unwrap();

    let mut greeter = container.resolve_owned::<Greeter>().unwrap();
    greeter.settings.name.push_str("-changed");
    assert_eq!(container.resolve::<Settings>().unwrap().name, "girder");
}

#[test]
fn test_named_registration_overrides_type_name() {
    let builder = RegistryBuilder::new();
    builder
        .register_with_name("primary-dsn", || "postgres://primary".to_string())
        .unwrap();
    builder
        .register_value_with_name("replica-dsn", "postgres://replica".to_string())
        .unwrap();
    let container = builder.build().unwrap();

    assert!(container.has("primary-dsn"));
    assert!(!container.has_type::<String>());
    assert_eq!(
        *container.resolve_named::<String>("replica-dsn").unwrap(),
        "postgres://replica"
    );
    let typer = container.typer("primary-dsn").unwrap();
    assert!(typer.has_factory());
    assert!(typer.dependencies().is_empty());
}

#[test]
fn test_unregistered_name_is_an_error() {
    struct Unregistered;

    let container = RegistryBuilder::new().build().unwrap();
    match container.resolve::<Unregistered>() {
        Err(Error::ProviderNotFound(name)) => assert!(name.ends_with("Unregistered")),
        _ => panic!("expected ProviderNotFound"),
    }
    assert!(container.resolve_any("nope").is_err());
}

#[test]
fn test_registration_is_safe_from_several_threads() {
    let builder = Arc::new(RegistryBuilder::new());
    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let builder = builder.clone();
            std::thread::spawn(move || {
                builder
                    .register_value_with_name(format!("value-{i}"), i)
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let builder = Arc::into_inner(builder).unwrap();
    let container = builder.build().unwrap();
    for i in 0..8u32 {
        assert_eq!(*container.resolve_named::<u32>(&format!("value-{i}")).unwrap(), i);
    }
}
