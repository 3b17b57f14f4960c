//! Fault isolation: a malformed write and a call into a missing application
//! fail on their own. Independent siblings still run; only the dependents of
//! the failed write are held back.

use super::{Scenario, ScenarioId};
use crate::apps::KvStore;
use std::time::Duration;
use tempo_core::{BuildError, Environment, FailureKind, GraphBuilder, ValidationContext, ValidationError, Verdict};
use tempo_env::{args, App, SimTime};

pub struct FaultIsolation;

impl Scenario for FaultIsolation {
    fn id(&self) -> ScenarioId {
        ScenarioId::FaultIsolation
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn init_apps(&self) -> Vec<Box<dyn App>> {
        vec![Box::new(KvStore::new())]
    }

    fn build_events(&self, b: &mut GraphBuilder, _env: &Environment) -> Result<(), BuildError> {
        let second = Duration::from_secs(1);

        let config = b
            .env(KvStore::NAME, "set", args! { "key" => "mode", "value" => "safe" })
            .label("config")
            .delay(second)
            .register()?;
        // numeric value where a string is required
        let bad = b
            .env(KvStore::NAME, "set", args! { "key" => "retries", "value" => 3 })
            .label("bad-write")
            .after(config)
            .delay(second)
            .register()?;
        let sibling = b
            .env(KvStore::NAME, "set", args! { "key" => "owner", "value" => "ops" })
            .label("sibling")
            .after(config)
            .delay(second)
            .register()?;
        b.env(KvStore::NAME, "set", args! { "key" => "retries_confirmed", "value" => "yes" })
            .label("downstream")
            .after(bad)
            .register()?;
        b.env("Ghost", "noop", args! {})
            .label("ghost")
            .at(SimTime::from_secs(3))
            .register()?;
        b.agent(KvStore::NAME, "get", args! { "key" => "owner" })
            .oracle()
            .after(sibling)
            .delay(second)
            .register()?;

        Ok(())
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        let failures: Vec<FailureKind> = ctx
            .entries()
            .iter()
            .filter(|entry| !entry.is_agent())
            .filter_map(|entry| entry.outcome.failure_kind())
            .collect();
        let store = ctx
            .app_state(KvStore::NAME)?
            .get("store")
            .and_then(|s| s.as_object())
            .ok_or_else(|| ValidationError::StateShape("KVStore has no store map".to_string()))?;

        let mut issues = Vec::new();
        if failures != [FailureKind::InvalidArgument, FailureKind::UnknownApplication] {
            issues.push(format!("unexpected failures {:?}", failures));
        }
        if store.get("owner").and_then(|v| v.as_str()) != Some("ops") {
            issues.push("sibling write missing".to_string());
        }
        if store.contains_key("retries_confirmed") {
            issues.push("dependent of a failed write ran".to_string());
        }

        if issues.is_empty() {
            Ok(Verdict::pass("failures stayed isolated"))
        } else {
            Ok(Verdict::fail(issues.join("; ")))
        }
    }
}
