mod common;

use std::collections::{BTreeSet, HashMap, HashSet};

use common::TestRuntime;
use module_reconfig::module::{
    ClassloaderModuleContext, ModuleOpenRequest, RequestError, ResolvedModuleRequirements,
};
use module_reconfig::reconfig::AggregatedOpenInstructions;
use module_reconfig::runtime::{ModuleHandle, RuntimeFlags};
use proptest::prelude::*;

const OPENED: [&str; 3] = ["java.base", "other.module", "missing.module"];
const OPENING: [&str; 4] = ["ALL-UNNAMED", "other.module", "java.base", "missing.target"];
const PACKAGES: [&str; 4] = ["java.lang", "java.util", "java.io", "org.other"];

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}(\\.[a-z][a-z0-9_]{0,8}){0,3}"
}

fn request_strategy() -> impl Strategy<Value = ModuleOpenRequest> {
    (
        prop::sample::select(OPENED.to_vec()),
        prop::sample::select(OPENING.to_vec()),
        prop::sample::subsequence(PACKAGES.to_vec(), 1..=PACKAGES.len()),
    )
        .prop_map(|(opened, opening, packages)| {
            ModuleOpenRequest::new(opened, opening, packages).unwrap()
        })
}

proptest! {
    #[test]
    fn valid_request_keeps_its_fields(
        opened in name_strategy(),
        opening in name_strategy(),
        packages in prop::collection::vec(name_strategy(), 1..6),
    ) {
        let request =
            ModuleOpenRequest::new(opened.clone(), opening.clone(), packages.clone()).unwrap();
        prop_assert_eq!(request.opened_module(), opened.as_str());
        prop_assert_eq!(request.opening_module(), opening.as_str());
        let expected: BTreeSet<String> = packages.into_iter().collect();
        prop_assert_eq!(request.packages(), &expected);
    }

    #[test]
    fn empty_package_set_is_rejected(opened in name_strategy(), opening in name_strategy()) {
        let result = ModuleOpenRequest::new(opened, opening, Vec::<String>::new());
        prop_assert!(matches!(result, Err(RequestError::InvalidArgument(_))));
    }

    #[test]
    fn aggregation_is_the_union_of_resolved_targets(
        requests in prop::collection::vec(request_strategy(), 0..12),
    ) {
        let fixture = TestRuntime::new(RuntimeFlags::unprivileged());
        let loader = fixture.memory.new_loader("app");
        let context = ClassloaderModuleContext::new(fixture.runtime(), &loader);

        let mut expected: HashMap<(ModuleHandle, String), HashSet<ModuleHandle>> = HashMap::new();
        let mut skipped = 0;
        for request in &requests {
            match (
                context.find_module(request.opened_module()),
                context.find_module(request.opening_module()),
            ) {
                (Some(opened), Some(opening)) => {
                    for package in request.packages() {
                        expected
                            .entry((opened.clone(), package.clone()))
                            .or_default()
                            .insert(opening.clone());
                    }
                }
                _ => skipped += 1,
            }
        }

        let aggregated = AggregatedOpenInstructions::aggregate(&requests, &context);
        prop_assert_eq!(aggregated.skipped(), skipped);
        let mut seen = 0;
        for (module, instructions) in aggregated.iter() {
            for (package, _) in instructions.edges() {
                let key = (module.clone(), package.to_string());
                prop_assert_eq!(instructions.targets(package), expected.get(&key));
            }
            seen += instructions
                .edges()
                .into_iter()
                .map(|(package, _)| package)
                .collect::<HashSet<_>>()
                .len();
        }
        prop_assert_eq!(seen, expected.len());
        prop_assert_eq!(fixture.memory.mutation_count(), 0);
    }

    #[test]
    fn manifest_value_is_sorted_and_unique(
        requests in prop::collection::vec(request_strategy(), 1..12),
    ) {
        let value = ResolvedModuleRequirements::new(&requests).add_opens_value().unwrap();
        let entries: Vec<&str> = value.split(' ').collect();

        let mut sorted = entries.clone();
        sorted.sort_by(|a, b| a.split_once('/').cmp(&b.split_once('/')));
        sorted.dedup();
        prop_assert_eq!(&entries, &sorted);

        let expected: BTreeSet<String> = requests
            .iter()
            .flat_map(|request| request.manifest_entries().collect::<Vec<_>>())
            .collect();
        prop_assert_eq!(entries.len(), expected.len());
        prop_assert!(entries.iter().all(|entry| expected.contains(*entry)));
    }
}
