#![allow(dead_code)]

pub mod b2_server;
pub mod display;
