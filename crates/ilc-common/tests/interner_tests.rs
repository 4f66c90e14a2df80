use super::*;
use rayon::prelude::*;

#[test]
fn test_intern_deduplicates() {
    let interner = ShardedInterner::new();
    let a1 = interner.intern("pkg.Name");
    let a2 = interner.intern("pkg.Name");
    assert_eq!(a1, a2);
    assert_eq!(&*interner.resolve(a1), "pkg.Name");
}

#[test]
fn test_empty_string_is_none() {
    let interner = ShardedInterner::new();
    assert_eq!(interner.intern(""), Atom::NONE);
    assert!(Atom::NONE.is_none());
    assert_eq!(&*interner.resolve(Atom::NONE), "");
}

#[test]
fn test_with_common_preinterns_synthetic_names() {
    let interner = ShardedInterner::with_common();
    assert!(interner.lookup("box-impl").is_some());
    assert!(interner.lookup("host.Int").is_some());
    assert!(interner.lookup("pkg.NotThere").is_none());
}

#[test]
fn test_intern_qualified_joins_segments() {
    let interner = ShardedInterner::new();
    let atom = interner.intern_qualified(&["pkg", "inner", "Name"]);
    assert_eq!(atom, interner.intern("pkg.inner.Name"));
}

#[test]
fn test_concurrent_interning_agrees() {
    let interner = ShardedInterner::new();
    let names: Vec<String> = (0..256).map(|i| format!("pkg.W{i}")).collect();

    let first: Vec<Atom> = names.par_iter().map(|n| interner.intern(n)).collect();
    let second: Vec<Atom> = names.par_iter().map(|n| interner.intern(n)).collect();

    assert_eq!(first, second);
    for (name, atom) in names.iter().zip(&first) {
        assert_eq!(&*interner.resolve(*atom), name.as_str());
    }
    assert_eq!(interner.len(), names.len() + 1);
}
