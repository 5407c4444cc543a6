use hovis_core::agent::{AgentId, AgentKind};
use hovis_core::core::Core;

#[test]
fn test_slots_follow_creation_order() {
    let mut core = Core::new();
    let pgw = core.add_agent(AgentKind::Pgw);
    let sgw = core.add_agent(AgentKind::Sgw);
    let mme = core.add_agent(AgentKind::Mme);
    let enbs = core.add_agents(AgentKind::BaseStation, 5);
    let ues = core.add_agents(AgentKind::Ue, 4);
    assert_eq!(pgw, AgentId::from(0));
    assert_eq!(sgw, AgentId::from(1));
    assert_eq!(mme, AgentId::from(2));
    assert_eq!(enbs.first(), Some(&AgentId::from(3)));
    assert_eq!(ues.first(), Some(&AgentId::from(8)));
    assert_eq!(core.len(), 12);
}

#[test]
fn test_agents_of_kind() {
    let mut core = Core::new();
    core.add_agents(AgentKind::BaseStation, 2);
    core.add_agent(AgentKind::Ue);
    core.add_agent(AgentKind::BaseStation);
    assert_eq!(
        core.agents_of(AgentKind::BaseStation),
        vec![AgentId::from(0), AgentId::from(1), AgentId::from(3)]
    );
    assert_eq!(core.kind_of(AgentId::from(2)), Some(AgentKind::Ue));
    assert_eq!(core.kind_of(AgentId::from(9)), None);
}
