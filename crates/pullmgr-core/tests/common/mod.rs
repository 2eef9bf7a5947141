#![allow(dead_code)]

pub mod pull_env;
