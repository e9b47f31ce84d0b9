use std::collections::VecDeque;

use tapeworks::{
    control::{Discard, Event},
    engine::{
        EffectUnit, Engine, EngineHost, EngineKind, EngineSlot, MorphageneCommand, UnitCommand,
    },
    io::{AudioInput, AudioOutput},
    preset::Preset,
    EngineConfig, EngineError,
};

const KINDS: [EngineKind; 4] = [
    EngineKind::Databender,
    EngineKind::Morphagene,
    EngineKind::Nautilus,
    EngineKind::Lubadh,
];

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_sample_rate(8_000.0)
        .with_buffer_seconds(1.0)
}

/// A preset that moves every knob off its default and every mode to its
/// second value.
fn busy_preset(kind: EngineKind) -> Preset {
    let mut preset = Preset::new(kind);
    for (name, default, min, max) in kind.param_specs() {
        let value = if default > (min + max) * 0.5 {
            min + (max - min) * 0.25
        } else {
            min + (max - min) * 0.75
        };
        preset = preset.with_param(name, value);
    }
    for (field, options) in kind.mode_options() {
        if let Some(value) = options.get(1).or_else(|| options.first()) {
            preset = preset.with_mode(field, *value);
        }
    }
    preset
}

#[test]
fn presets_survive_json_and_reload() {
    for kind in KINDS {
        let mut source = EffectUnit::new(kind, &config()).unwrap();
        source.load_preset(&busy_preset(kind)).unwrap();
        let saved = source.preset();

        let json = saved.to_json().unwrap();
        let decoded = Preset::from_json(&json).unwrap();
        assert_eq!(decoded, saved, "{}", kind.name());

        let mut target = EffectUnit::new(kind, &config()).unwrap();
        target.load_preset(&decoded).unwrap();
        assert_eq!(target.params(), saved.params, "{}", kind.name());
        assert_eq!(target.modes(), saved.modes, "{}", kind.name());
    }
}

#[test]
fn loading_a_preset_twice_is_the_same_as_once() {
    for kind in KINDS {
        let preset = busy_preset(kind);
        let mut once = EffectUnit::new(kind, &config()).unwrap();
        once.load_preset(&preset).unwrap();
        let mut twice = EffectUnit::new(kind, &config()).unwrap();
        twice.load_preset(&preset).unwrap();
        twice.load_preset(&preset).unwrap();
        assert_eq!(once.preset(), twice.preset(), "{}", kind.name());
    }
}

#[test]
fn empty_preset_restores_defaults() {
    for kind in KINDS {
        let mut unit = EffectUnit::new(kind, &config()).unwrap();
        let defaults = unit.preset();
        unit.load_preset(&busy_preset(kind)).unwrap();
        assert_ne!(unit.preset(), defaults, "{}", kind.name());
        unit.load_preset(&Preset::new(kind)).unwrap();
        assert_eq!(unit.preset(), defaults, "{}", kind.name());
    }
}

#[test]
fn preset_for_another_engine_is_refused() {
    let mut unit = EffectUnit::new(EngineKind::Nautilus, &config()).unwrap();
    let err = unit
        .load_preset(&Preset::new(EngineKind::Lubadh))
        .unwrap_err();
    assert!(matches!(err, EngineError::EngineMismatch { .. }));
}

#[test]
fn unit_commands_match_local_loading() {
    for kind in KINDS {
        let preset = busy_preset(kind);
        let mut local = EffectUnit::new(kind, &config()).unwrap();
        local.load_preset(&preset).unwrap();

        let mut remote = EffectUnit::new(kind, &config()).unwrap();
        for command in preset.unit_commands(kind).unwrap() {
            remote.apply(command);
        }
        assert_eq!(local.preset(), remote.preset(), "{}", kind.name());
    }
}

#[test]
fn invalid_config_leaves_slot_failed_and_silent() {
    let mut slot = EngineSlot::default();
    let bad = config().with_sample_rate(0.0);
    assert!(slot.initialize(EngineKind::Databender, &bad).is_none());
    assert!(slot.error().is_some());

    let mut left = vec![1.0; 64];
    let mut right = vec![1.0; 64];
    slot.process(
        &AudioInput::silent(),
        &mut AudioOutput::new(&mut left, &mut right),
        &mut Discard,
    );
    assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
}

#[test]
fn host_applies_queued_commands_and_meters() {
    let unit = EffectUnit::new(EngineKind::Databender, &config()).unwrap();
    let mut commands = VecDeque::new();
    commands.push_back(EngineKind::Databender.param_command("mix", 0.0).unwrap());
    let mut host = EngineHost::new(unit, commands, Vec::new(), &config()).with_meter_interval(1);

    let input = vec![0.5; 256];
    let mut left = vec![0.0; 256];
    let mut right = vec![0.0; 256];
    host.process(
        &AudioInput::mono(&input),
        &mut AudioOutput::new(&mut left, &mut right),
    );

    // dry only: the input comes straight through
    assert!(left.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    assert_eq!(host.engine().params()["mix"], 0.0);
    assert!(host
        .events_mut()
        .iter()
        .any(|e| matches!(e, Event::Meter(levels) if (levels.left - 0.5).abs() < 1e-6)));
}

#[cfg(feature = "rtrb")]
#[test]
fn commands_and_events_cross_ring_buffers() {
    use rtrb::RingBuffer;

    let unit = EffectUnit::new(EngineKind::Morphagene, &config()).unwrap();
    let (mut command_tx, command_rx) = RingBuffer::<UnitCommand>::new(16);
    let (event_tx, mut event_rx) = RingBuffer::<Event>::new(64);
    let mut host = EngineHost::new(unit, command_rx, event_tx, &config());

    command_tx
        .push(UnitCommand::Morphagene(MorphageneCommand::Record(true)))
        .unwrap();

    let input = vec![0.25; 512];
    let mut left = vec![0.0; 512];
    let mut right = vec![0.0; 512];
    host.process(
        &AudioInput::mono(&input),
        &mut AudioOutput::new(&mut left, &mut right),
    );

    command_tx
        .push(UnitCommand::Morphagene(MorphageneCommand::Record(false)))
        .unwrap();
    host.process(
        &AudioInput::silent(),
        &mut AudioOutput::new(&mut left, &mut right),
    );

    let mut events = Vec::new();
    while let Ok(event) = event_rx.pop() {
        events.push(event);
    }
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::RecordingStopped { length: 512, .. })));
}
