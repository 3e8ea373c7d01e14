use crate::messages::{AgentId, Message, SimulatorApi};

pub mod exchange_agent;
pub mod herd_follower_agent;
pub mod herd_master_agent;
pub mod noise_agent;
pub mod trading;

pub trait Agent {
    fn id(&self) -> AgentId;
    fn name(&self) -> &str;

    fn on_start(&mut self, _sim: &mut dyn SimulatorApi) {}
    fn on_stop(&mut self, _sim: &mut dyn SimulatorApi) {}
    fn on_wakeup(&mut self, _sim: &mut dyn SimulatorApi, _now_ns: u64) {}
    fn on_message(&mut self, _sim: &mut dyn SimulatorApi, _msg: &Message) {}
}
