//! MIDI device surface tests: the consolidated input queue reaches
//! `midi_in` consumers, and `midi_out` delivers through the send hook.

mod common;

use common::engine_with_devices;
use polaron::device::ExternalDevice;
use polaron::midi::{ChMsg, NOTE_OFF, NOTE_ON};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_midi_in_to_midi_out() {
    let queue: Rc<RefCell<Vec<ChMsg>>> = Rc::new(RefCell::new(Vec::new()));
    let sent: Rc<RefCell<Vec<ChMsg>>> = Rc::new(RefCell::new(Vec::new()));

    let sent_tap = Rc::clone(&sent);
    let devices = vec![
        ExternalDevice::midi_in("keys", Rc::clone(&queue), 64),
        ExternalDevice::midi_out("synth", Rc::new(RefCell::new(move |m: &ChMsg| {
            sent_tap.borrow_mut().push(*m);
        }))),
    ];

    let pgm = json!({
        "network": { "procs": {
            "m_in":  { "class": "midi_in" },
            "m_out": { "class": "midi_out",
                       "args": { "dev": "synth" },
                       "in": { "in": "m_in.out" } }
        }}
    });
    let mut engine = engine_with_devices(&pgm, devices);

    // one cycle with two pending messages
    queue.borrow_mut().push(ChMsg::new(0, 0, NOTE_ON, 60, 100));
    queue.borrow_mut().push(ChMsg::new(0, 0, NOTE_OFF, 60, 0));
    engine.exec_cycle().unwrap();

    assert_eq!(sent.borrow().len(), 2);
    assert_eq!(sent.borrow()[0].d0, 60);
    assert!(sent.borrow()[0].is_note_on());
    assert!(sent.borrow()[1].is_note_off());

    // an empty cycle sends nothing further
    queue.borrow_mut().clear();
    engine.exec_cycle().unwrap();
    assert_eq!(sent.borrow().len(), 2);
}

/// A device-filtered `midi_in` passes only its own device's messages.
#[test]
fn test_midi_in_device_filter() {
    let queue: Rc<RefCell<Vec<ChMsg>>> = Rc::new(RefCell::new(Vec::new()));
    let sent: Rc<RefCell<Vec<ChMsg>>> = Rc::new(RefCell::new(Vec::new()));

    let sent_tap = Rc::clone(&sent);
    let devices = vec![
        ExternalDevice::midi_in("keys", Rc::clone(&queue), 64),
        ExternalDevice::midi_in("pedal", Rc::clone(&queue), 64),
        ExternalDevice::midi_out("synth", Rc::new(RefCell::new(move |m: &ChMsg| {
            sent_tap.borrow_mut().push(*m);
        }))),
    ];

    let pgm = json!({
        "network": { "procs": {
            "m_in":  { "class": "midi_in", "args": { "dev": "pedal" } },
            "m_out": { "class": "midi_out",
                       "args": { "dev": "synth" },
                       "in": { "in": "m_in.out" } }
        }}
    });
    let mut engine = engine_with_devices(&pgm, devices);

    // dev_idx 0 = keys, 1 = pedal
    queue.borrow_mut().push(ChMsg::new(0, 0, NOTE_ON, 60, 100));
    queue.borrow_mut().push(ChMsg::new(1, 0, NOTE_ON, 64, 100));
    engine.exec_cycle().unwrap();

    assert_eq!(sent.borrow().len(), 1);
    assert_eq!(sent.borrow()[0].d0, 64);
}
