#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use herd_sim::agents::Agent;
use herd_sim::events::{ClosureListener, SimEvent};
use herd_sim::messages::{AgentId, Message, SimulatorApi};
use herd_sim::sim_engine::SimEngine;

/// Runs an agent inside the kernel while the test keeps a handle to inspect
/// it during or after the run.
pub struct Shared<A: Agent> {
    id: AgentId,
    name: String,
    inner: Rc<RefCell<A>>,
}

impl<A: Agent + 'static> Shared<A> {
    pub fn wrap(agent: A) -> (Box<dyn Agent>, Rc<RefCell<A>>) {
        let id = agent.id();
        let name = agent.name().to_string();
        let inner = Rc::new(RefCell::new(agent));
        let shared = Shared {
            id,
            name,
            inner: Rc::clone(&inner),
        };
        (Box::new(shared), inner)
    }
}

impl<A: Agent> Agent for Shared<A> {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, sim: &mut dyn SimulatorApi) {
        self.inner.borrow_mut().on_start(sim);
    }

    fn on_stop(&mut self, sim: &mut dyn SimulatorApi) {
        self.inner.borrow_mut().on_stop(sim);
    }

    fn on_wakeup(&mut self, sim: &mut dyn SimulatorApi, now_ns: u64) {
        self.inner.borrow_mut().on_wakeup(sim, now_ns);
    }

    fn on_message(&mut self, sim: &mut dyn SimulatorApi, msg: &Message) {
        self.inner.borrow_mut().on_message(sim, msg);
    }
}

/// Subscribe a listener that keeps every event of the run.
pub fn collect_events(engine: &mut SimEngine) -> Rc<RefCell<Vec<SimEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.subscribe(Box::new(ClosureListener::new(move |ev: &SimEvent| {
        sink.borrow_mut().push(ev.clone())
    })));
    events
}
