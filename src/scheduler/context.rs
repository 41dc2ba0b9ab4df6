//! 推理上下文：目标、上次结果、最近记忆

use crate::agent::Agent;

/// 构建发给推理网关的上下文；记忆按插入顺序排列，最新的在最后
pub fn build_context_prompt(agent: &Agent, max_memories: usize) -> String {
    let mut s = String::new();
    s.push_str(&format!("Goal: {}\n", agent.goal));

    if agent.last_result.is_empty() {
        s.push_str("Last result: (none yet)\n");
    } else {
        s.push_str(&format!("Last result: {}\n", agent.last_result));
    }

    let recent = agent.recent_memories(max_memories);
    if !recent.is_empty() {
        s.push_str("\n## Recent memories\n");
        for m in recent {
            s.push_str(&format!("- {}: {}\n", m.key, m.value));
        }
    }

    s.push_str(&format!(
        "\nThis is execution #{}. Continue working toward the goal.",
        agent.execution_count + 1
    ));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentId, Identity};
    use chrono::Utc;

    #[test]
    fn test_prompt_uses_at_most_five_recent_memories() {
        let owner = Identity::new("alice");
        let mut agent = Agent::new(AgentId(1), owner.clone(), "Plan a trip", Utc::now()).unwrap();
        for i in 0..7 {
            agent
                .store_memory(&owner, &owner, &format!("m{i}"), &format!("value {i}"), Utc::now())
                .unwrap();
        }
        agent.commit_result(&owner, &owner, "Booked flights", Utc::now()).unwrap();

        let prompt = build_context_prompt(&agent, 5);
        assert!(prompt.starts_with("Goal: Plan a trip\n"));
        assert!(prompt.contains("Last result: Booked flights"));
        assert!(!prompt.contains("m0:"));
        assert!(!prompt.contains("m1:"));
        let p2 = prompt.find("m2:").unwrap();
        let p6 = prompt.find("m6:").unwrap();
        assert!(p2 < p6);
        assert!(prompt.contains("execution #2"));
    }

    #[test]
    fn test_prompt_for_fresh_agent() {
        let agent = Agent::new(AgentId(1), Identity::new("a"), "Say hi", Utc::now()).unwrap();
        let prompt = build_context_prompt(&agent, 5);
        assert!(prompt.contains("(none yet)"));
        assert!(!prompt.contains("Recent memories"));
    }
}
