use ar_engine::{Engine, Frame};
use ar_patch::EngineCommand;
use criterion::{criterion_group, criterion_main, Criterion};

fn render_chord(c: &mut Criterion) {
    let mut engine = Engine::new(44100.0);
    for note in [48u8, 60, 64, 67, 72, 76, 79, 84] {
        engine.handle_command(EngineCommand::NoteOn { note, velocity: 0.9 });
    }
    let mut buf = vec![Frame::silence(); 512];
    c.bench_function("render_512_8_voices", |b| {
        b.iter(|| {
            engine.render(&mut buf);
            criterion::black_box(buf[0]);
        })
    });
}

fn render_arp(c: &mut Criterion) {
    let mut engine = Engine::new(44100.0);
    let arp_on = engine.schema().lookup("Arp/Arp On").unwrap();
    engine.handle_command(EngineCommand::SetParam { id: arp_on, value: 1.0 });
    let mut buf = vec![Frame::silence(); 512];
    engine.render(&mut buf);
    for note in [60u8, 64, 67] {
        engine.handle_command(EngineCommand::NoteOn { note, velocity: 0.9 });
    }
    c.bench_function("render_512_arp", |b| {
        b.iter(|| {
            engine.render(&mut buf);
            criterion::black_box(buf[0]);
        })
    });
}

criterion_group!(benches, render_chord, render_arp);
criterion_main!(benches);
