use proptest::prelude::*;
use statsheet::*;

/// Random edge requests over `n` scalars.
fn edges(n: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..n, 0..n), 0..40)
}

proptest! {
    /// No sequence of edge requests ever closes a cycle, and a rejected
    /// request leaves the edge set alone.
    #[test]
    fn prop_dependency_graph_stays_acyclic(requests in edges(8)) {
        let mut sheet = Sheet::new();
        let ids: Vec<NodeId> = (0..8).map(|i| sheet.create_scalar(format!("n{i}"), 0.0)).collect();

        for (from, to) in requests {
            let (dependent, dependency) = (ids[from], ids[to]);
            let before = sheet.dependencies(dependent).unwrap();
            match sheet.add_dependency(dependent, dependency) {
                Ok(_) => {
                    prop_assert!(!sheet.has_dependency(dependency, dependent, true).unwrap());
                }
                Err(AttrError::CircularDependency { path }) => {
                    prop_assert_eq!(path.first(), path.last());
                    prop_assert_eq!(sheet.dependencies(dependent).unwrap(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        for &id in &ids {
            prop_assert!(!sheet.has_dependency(id, id, true).unwrap());
            for dep in sheet.dependencies(id).unwrap() {
                prop_assert!(sheet.dependents(dep).unwrap().contains(&id));
            }
        }
    }

    /// After any leaf write, a chain of sums over the leaves is current.
    #[test]
    fn prop_propagation_is_complete(
        leaves in prop::collection::vec(-100i32..100, 1..6),
        writes in prop::collection::vec((0usize..6, -100i32..100), 1..20),
    ) {
        let mut sheet = Sheet::new();
        let ids: Vec<NodeId> = leaves
            .iter()
            .enumerate()
            .map(|(i, v)| sheet.create_scalar(format!("leaf {i}"), f64::from(*v)))
            .collect();
        let partial = sheet.create_sum("partial", &ids[..1]).unwrap();
        let total = sheet.create_sum("total", &ids).unwrap();
        let grand = sheet.create_sum("grand", &[partial, total]).unwrap();
        let best = sheet.create_max("best", &ids).unwrap();

        let mut expected: Vec<f64> = leaves.iter().map(|v| f64::from(*v)).collect();
        for (slot, v) in writes {
            let slot = slot % ids.len();
            sheet.set_value(ids[slot], f64::from(v)).unwrap();
            expected[slot] = f64::from(v);

            let sum: f64 = expected.iter().sum();
            let max = expected.iter().cloned().fold(f64::MIN, f64::max);
            prop_assert_eq!(sheet.value(total).unwrap(), sum);
            prop_assert_eq!(sheet.value(grand).unwrap(), sum + expected[0]);
            prop_assert_eq!(sheet.value(best).unwrap(), max);
        }
    }

    /// An un-pinned modifier always reads base + offset.
    #[test]
    fn prop_modifier_identity(
        base in -1000i32..1000,
        offset in -1000i32..1000,
        pin in proptest::option::of(-1000i32..1000),
    ) {
        let mut sheet = Sheet::new();
        let m = sheet.modifier("M").build().unwrap();
        sheet.set_base(m, f64::from(base)).unwrap();
        sheet.set_offset(m, f64::from(offset)).unwrap();
        if let Some(pin) = pin {
            sheet.set_value(m, f64::from(pin)).unwrap();
            prop_assert_eq!(sheet.value(m).unwrap(), f64::from(pin));
            sheet.set_override(m, false).unwrap();
        }

        prop_assert!(!sheet.overridden(m).unwrap());
        prop_assert_eq!(
            sheet.value(m).unwrap(),
            sheet.base(m).unwrap() + sheet.offset(m).unwrap()
        );
    }
}
