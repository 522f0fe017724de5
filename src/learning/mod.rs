pub mod policy;
pub mod prior;
pub mod q_table;
pub mod state_space;
