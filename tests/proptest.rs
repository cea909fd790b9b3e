// SPDX-License-Identifier: MPL-2.0

use proptest::prelude::*;

use bimodal::constraint::Constraint;
use bimodal::project::{Package, ProjectName};
use bimodal::reach::external_reach;
use bimodal::version::Version;

fn version_strategy() -> impl Strategy<Value = Version> {
    (0u64..4, 0u64..4, 0u64..4).prop_map(|(major, minor, patch)| Version::semver(major, minor, patch))
}

fn constraint_strategy() -> impl Strategy<Value = Constraint> {
    prop_oneof![
        Just(Constraint::Any),
        Just(Constraint::None),
        version_strategy().prop_map(Constraint::Exact),
        (0u64..4, 0u64..4).prop_map(|(major, minor)| {
            format!("~{major}.{minor}.0").parse().unwrap()
        }),
        (0u64..4).prop_map(|major| format!("^{major}").parse().unwrap()),
        (0u64..4, 0u64..4).prop_map(|(a, b)| {
            format!(">={}.0.0, <{}.0.0", a.min(b), a.max(b) + 1)
                .parse()
                .unwrap()
        }),
    ]
}

proptest! {

    // Constraint algebra ------------------------------

    #[test]
    fn intersection_admits_exactly_the_common_versions(
        c1 in constraint_strategy(),
        c2 in constraint_strategy(),
        v in version_strategy(),
    ) {
        prop_assert_eq!(
            c1.intersect(&c2).matches(&v),
            c1.matches(&v) && c2.matches(&v)
        );
    }

    #[test]
    fn intersection_is_commutative(
        c1 in constraint_strategy(),
        c2 in constraint_strategy(),
        v in version_strategy(),
    ) {
        // Range intersections may differ syntactically depending on
        // operand order; what matters is that they admit the same set.
        prop_assert_eq!(
            c1.intersect(&c2).matches(&v),
            c2.intersect(&c1).matches(&v)
        );
    }

    #[test]
    fn intersection_is_associative(
        c1 in constraint_strategy(),
        c2 in constraint_strategy(),
        c3 in constraint_strategy(),
        v in version_strategy(),
    ) {
        prop_assert_eq!(
            c1.intersect(&c2).intersect(&c3).matches(&v),
            c1.intersect(&c2.intersect(&c3)).matches(&v)
        );
    }

    #[test]
    fn intersection_with_any_is_identity(c in constraint_strategy()) {
        prop_assert_eq!(Constraint::Any.intersect(&c), c.clone());
        prop_assert_eq!(c.intersect(&Constraint::Any), c);
    }

    #[test]
    fn intersection_with_none_is_none(c in constraint_strategy()) {
        prop_assert_eq!(Constraint::None.intersect(&c), Constraint::None);
        prop_assert_eq!(c.intersect(&Constraint::None), Constraint::None);
    }

    #[test]
    fn intersection_is_idempotent(
        c in constraint_strategy(),
        v in version_strategy(),
    ) {
        prop_assert_eq!(c.intersect(&c).matches(&v), c.matches(&v));
    }

    // Reach computation -------------------------------

    #[test]
    fn reach_is_independent_of_package_order(
        (original, shuffled) in packages_strategy().prop_flat_map(|packages| {
            (Just(packages.clone()), Just(packages).prop_shuffle())
        })
    ) {
        let root = ProjectName::new("r");
        prop_assert_eq!(
            external_reach(&root, &original),
            external_reach(&root, &shuffled)
        );
    }
}

/// Up to six packages under root `r`, each importing a random subset of
/// the other internal packages and of three external paths. Cycles are
/// allowed and expected.
fn packages_strategy() -> impl Strategy<Value = Vec<Package>> {
    (1usize..6).prop_flat_map(|count| {
        prop::collection::vec(prop::collection::vec(any::<bool>(), count + 3), count).prop_map(
            move |edges| {
                let path = |i: usize| {
                    if i == 0 {
                        "r".to_owned()
                    } else {
                        format!("r/p{i}")
                    }
                };
                edges
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let mut imports = Vec::new();
                        for (j, picked) in picks.into_iter().enumerate() {
                            if !picked {
                                continue;
                            }
                            if j < count {
                                if j != i {
                                    imports.push(path(j));
                                }
                            } else {
                                imports.push(format!("x{}", j - count));
                            }
                        }
                        Package::new(path(i), imports)
                    })
                    .collect()
            },
        )
    })
}
