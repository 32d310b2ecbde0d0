pub mod chat;
pub mod checkpoint;
pub mod config_cmd;
pub mod run;
