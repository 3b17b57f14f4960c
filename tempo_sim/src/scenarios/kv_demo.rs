//! KV demo: rename the user and report the change.

use super::{Scenario, ScenarioId};
use crate::apps::{AgentUserInterface, KvStore};
use std::time::Duration;
use tempo_core::{BuildError, Environment, GraphBuilder, ValidationContext, ValidationError, Verdict};
use tempo_env::{args, App};

const NEW_NAME: &str = "Jane Doe";

pub struct KvDemo;

impl Scenario for KvDemo {
    fn id(&self) -> ScenarioId {
        ScenarioId::KvDemo
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(300)
    }

    fn init_apps(&self) -> Vec<Box<dyn App>> {
        let mut kv = KvStore::new();
        kv.insert("name", "John Doe");
        kv.insert("age", "20");
        kv.insert("city", "New York");
        vec![Box::new(kv), Box::new(AgentUserInterface::new())]
    }

    fn build_events(&self, b: &mut GraphBuilder, env: &Environment) -> Result<(), BuildError> {
        let previous = env
            .get_typed::<KvStore>()
            .and_then(|kv| kv.value("name"))
            .unwrap_or("unknown")
            .to_string();
        let second = Duration::from_secs(1);

        let ask = b
            .user(
                AgentUserInterface::NAME,
                "send_message_to_agent",
                args! {
                    "content" => "Change the user's name to 'Jane Doe', and then verify it. \
                                  Respond with a report of the previous name and what it was changed to."
                },
            )
            .delay(second)
            .register()?;
        let read_all = b
            .agent(KvStore::NAME, "get_all", args! {})
            .oracle()
            .after(ask)
            .delay(second)
            .register()?;
        let rename = b
            .agent(KvStore::NAME, "set", args! { "key" => "name", "value" => NEW_NAME })
            .oracle()
            .after(read_all)
            .delay(second)
            .register()?;
        let verify = b
            .agent(KvStore::NAME, "get", args! { "key" => "name" })
            .oracle()
            .after(rename)
            .delay(second)
            .register()?;
        b.agent(
            AgentUserInterface::NAME,
            "send_message_to_user",
            args! { "content" => format!("The name was changed from {} to {}.", previous, NEW_NAME) },
        )
        .oracle()
        .after(verify)
        .delay(second)
        .register()?;

        Ok(())
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        let state = ctx.app_state(KvStore::NAME)?;
        let name = state
            .pointer("/store/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::StateShape("KVStore has no name".to_string()))?;

        if name == NEW_NAME {
            Ok(Verdict::pass(format!("name changed to {}", name)))
        } else {
            Ok(Verdict::fail(format!("Name not changed (still {})", name)))
        }
    }
}
