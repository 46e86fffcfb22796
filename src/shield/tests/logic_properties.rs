//! Property tests for and/or composition over real rule nodes

use cretoai_shield::{
    CacheMode, Decision, FieldCall, FieldInfo, NodeId, PolicyBuilder, RequestContext, RuleError, ShieldOptions,
};
use proptest::prelude::*;
use serde_json::Value;

const DENY: &str = "Not Authorised!";

#[derive(Debug, Clone)]
enum Outcome {
    Allow,
    Deny,
    Fail(u8),
}

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Allow),
        Just(Outcome::Deny),
        any::<u8>().prop_map(Outcome::Fail),
    ]
}

fn expected(outcome: &Outcome) -> Decision {
    match outcome {
        Outcome::Allow => Decision::Allowed,
        Outcome::Deny => Decision::Denied(DENY.to_string()),
        Outcome::Fail(n) => Decision::Errored(RuleError::internal(format!("failure {}", n))),
    }
}

fn rule_for(policy: &mut PolicyBuilder, outcome: &Outcome, cache: CacheMode) -> NodeId {
    let outcome = outcome.clone();
    policy.rule("generated", cache, move |_call: FieldCall| {
        let outcome = outcome.clone();
        async move {
            match outcome {
                Outcome::Allow => Ok(true),
                Outcome::Deny => Ok(false),
                Outcome::Fail(n) => Err(RuleError::internal(format!("failure {}", n))),
            }
        }
    })
}

fn evaluate(outcomes: &[Outcome], cache: CacheMode) -> (Decision, Decision) {
    let mut policy = PolicyBuilder::new();
    let children: Vec<NodeId> = outcomes.iter().map(|o| rule_for(&mut policy, o, cache)).collect();
    let and = policy.and(children.clone());
    let or = policy.or(children);
    let tree = policy.build(ShieldOptions::default()).unwrap();

    let call = FieldCall::new(
        Value::Null,
        Default::default(),
        RequestContext::default(),
        FieldInfo::new("Query", "field"),
    );

    tokio_test::block_on(async { (tree.evaluate(and, &call).await, tree.evaluate(or, &call).await) })
}

proptest! {
    #[test]
    fn and_is_allowed_iff_all_allowed(outcomes in prop::collection::vec(outcome(), 1..8)) {
        let (and, _) = evaluate(&outcomes, CacheMode::NoCache);
        let all_allowed = outcomes.iter().all(|o| matches!(o, Outcome::Allow));
        prop_assert_eq!(and.is_allowed(), all_allowed);
    }

    #[test]
    fn and_reports_first_non_allowed(outcomes in prop::collection::vec(outcome(), 1..8)) {
        let (and, _) = evaluate(&outcomes, CacheMode::Contextual);
        let first = outcomes
            .iter()
            .map(expected)
            .find(|d| !d.is_allowed())
            .unwrap_or(Decision::Allowed);
        prop_assert_eq!(and, first);
    }

    #[test]
    fn or_is_allowed_iff_any_allowed(outcomes in prop::collection::vec(outcome(), 1..8)) {
        let (_, or) = evaluate(&outcomes, CacheMode::NoCache);
        let any_allowed = outcomes.iter().any(|o| matches!(o, Outcome::Allow));
        prop_assert_eq!(or.is_allowed(), any_allowed);
    }

    #[test]
    fn or_without_allow_prefers_first_failure(outcomes in prop::collection::vec(outcome(), 1..8)) {
        prop_assume!(!outcomes.iter().any(|o| matches!(o, Outcome::Allow)));
        let (_, or) = evaluate(&outcomes, CacheMode::Contextual);

        let first_failure = outcomes.iter().find(|o| matches!(o, Outcome::Fail(_)));
        match first_failure {
            Some(failure) => prop_assert_eq!(or, expected(failure)),
            None => prop_assert_eq!(or, Decision::Denied(DENY.to_string())),
        }
    }
}
