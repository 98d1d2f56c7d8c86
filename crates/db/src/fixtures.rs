use chrono::{DateTime, Duration, Utc};

use docket_core::domain::importance::Importance;
use docket_core::domain::item::ItemFields;
use docket_core::errors::AgendaError;

use crate::repositories::{AgendaRepository, KeyValueStore};

/// Demo agenda used by `docket seed` and local walkthroughs. Items are
/// stamped one second apart in declaration order so their display order is
/// deterministic.
const DEMO_ITEMS: &[DemoItem] = &[
    DemoItem {
        name: "Release checklist",
        importance: "HIGH",
        desc: "Walk the checklist before tagging the next release",
        due_date: "",
        assignees: &["U0DEMO1"],
    },
    DemoItem {
        name: "Onboarding docs",
        importance: "MEDIUM",
        desc: "Refresh setup guide for new contributors",
        due_date: "1767225600",
        assignees: &["U0DEMO2", "U0DEMO3"],
    },
    DemoItem {
        name: "Incident review",
        importance: "HIGH",
        desc: "",
        due_date: "",
        assignees: &[],
    },
    DemoItem {
        name: "Team lunch",
        importance: "MIN",
        desc: "Pick a place",
        due_date: "",
        assignees: &[],
    },
];

#[derive(Debug, Clone, Copy)]
struct DemoItem {
    name: &'static str,
    importance: &'static str,
    desc: &'static str,
    due_date: &'static str,
    assignees: &'static [&'static str],
}

pub struct DemoAgenda;

impl DemoAgenda {
    /// Names in the order the demo agenda displays them.
    pub const EXPECTED_ORDER: &'static [&'static str] =
        &["Release checklist", "Incident review", "Onboarding docs", "Team lunch"];

    /// Adds every demo item that is not already present.
    pub async fn load<S: KeyValueStore>(
        repo: &AgendaRepository<S>,
        base_time: DateTime<Utc>,
    ) -> Result<SeedResult, AgendaError> {
        let mut result = SeedResult::default();

        for (offset, item) in DEMO_ITEMS.iter().enumerate() {
            let fields = ItemFields::new(item.name, item.importance)
                .desc(item.desc)
                .due_date(item.due_date);
            let assignees = item.assignees.iter().map(|id| id.to_string()).collect();
            let created_at = base_time + Duration::seconds(offset as i64);

            match repo.add_at(fields, assignees, created_at).await {
                Ok(()) => result.items_seeded.push(item.name),
                Err(AgendaError::AlreadyExists(_)) => result.items_skipped.push(item.name),
                Err(error) => return Err(error),
            }
        }

        Ok(result)
    }

    /// Checks that every demo item is present with its seeded importance.
    pub async fn verify<S: KeyValueStore>(
        repo: &AgendaRepository<S>,
    ) -> Result<VerificationResult, AgendaError> {
        let items = repo.list(false).await?;
        let checks = DEMO_ITEMS
            .iter()
            .map(|demo| {
                let expected = Importance::parse(demo.importance).ok();
                let present = items
                    .iter()
                    .any(|item| item.name == demo.name && Some(item.importance) == expected);
                (demo.name, present)
            })
            .collect::<Vec<_>>();

        Ok(VerificationResult { all_present: checks.iter().all(|(_, ok)| *ok), checks })
    }

    /// Removes the demo items, leaving anything else on the agenda alone.
    pub async fn clean<S: KeyValueStore>(repo: &AgendaRepository<S>) -> Result<(), AgendaError> {
        for item in DEMO_ITEMS {
            match repo.remove(item.name).await {
                Ok(()) | Err(AgendaError::NotFound(_)) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SeedResult {
    pub items_seeded: Vec<&'static str>,
    pub items_skipped: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
