//! Shared helpers for the integration tests.
#![allow(dead_code)]

use polaron::device::ExternalDevice;
use polaron::engine::Engine;
use polaron::procs;
use serde_json::Value as Cfg;
use std::rc::Rc;

/// Build and initialize an engine from an inline program cfg.
pub fn engine_from(pgm: &Cfg) -> Engine {
    engine_with_devices(pgm, Vec::new())
}

pub fn engine_with_devices(pgm: &Cfg, devices: Vec<ExternalDevice>) -> Engine {
    let classes = Rc::new(procs::class_dict(pgm.get("udp")).expect("class dict"));
    let mut engine = Engine::new(classes, pgm).expect("engine cfg");
    engine.initialize(devices, None).expect("initialize");
    engine
}

/// Build without initializing (for tests that expect build failures).
pub fn try_engine_from(pgm: &Cfg) -> polaron::Result<Engine> {
    let classes = Rc::new(procs::class_dict(pgm.get("udp"))?);
    let mut engine = Engine::new(classes, pgm)?;
    engine.initialize(Vec::new(), None)?;
    Ok(engine)
}

pub fn f64_of(engine: &Engine, proc_label: &str, var_label: &str) -> f64 {
    engine
        .get_variable_value(proc_label, var_label, None)
        .unwrap_or_else(|e| panic!("read {proc_label}.{var_label}: {e}"))
        .as_f64()
        .unwrap()
}
