use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use xethsb_channel::{
    Channel, ChannelConfig, ChannelError, ConnectionState, DeviceInfo, DeviceKind, DeviceRegistry,
    Registry, DEFAULT_NET,
};
use xethsb_frame::{decode, encode, Carrier, Kind, Message, Speed, Stat, JUMBO_FRAME_SIZE};
use xethsb_transport::{SeqpacketListener, SeqpacketStream, SocketName, TransportError};

fn unique_name(tag: &str) -> SocketName {
    SocketName::abstract_name(format!(
        "xethsb-test-{}-{}-{}",
        tag,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

fn config(tag: &str) -> ChannelConfig {
    ChannelConfig {
        name: unique_name(tag),
        accept_poll: Duration::from_millis(5),
        ..ChannelConfig::default()
    }
}

fn port(ifindex: i32) -> DeviceInfo {
    DeviceInfo {
        ifindex,
        name: format!("xeth{ifindex}"),
        iflink: None,
        net: DEFAULT_NET,
        addr: [2, 0, 0, 0, 0, ifindex as u8],
        kind: DeviceKind::Port {
            id: 3000 + ifindex as u32,
            portid: ifindex - 1,
            port: (ifindex - 1) as i16,
            subport: -1,
            devtype: 0,
        },
    }
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn connect(channel: &Channel) -> SeqpacketStream {
    let stream = SeqpacketStream::connect(channel.name()).expect("controller should connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout should apply");
    stream
}

fn read_message(stream: &SeqpacketStream) -> Message {
    let mut buf = vec![0u8; JUMBO_FRAME_SIZE];
    let n = stream.recv(&mut buf).expect("frame should arrive");
    decode(&buf[..n]).expect("frame should decode")
}

fn read_dump(stream: &SeqpacketStream) -> Vec<Message> {
    let mut out = Vec::new();
    loop {
        let message = read_message(stream);
        let done = message == Message::Break;
        out.push(message);
        if done {
            return out;
        }
    }
}

fn send(stream: &SeqpacketStream, message: Message) {
    let frame = encode(&message).expect("frame should encode");
    stream.send(&frame).expect("controller send should succeed");
}

#[test]
fn events_are_dropped_while_no_controller_is_connected() {
    let registry = Arc::new(Registry::default());
    let dev = registry.insert(port(3));
    let channel = Channel::start(config("drop"), registry).expect("channel should start");

    assert_eq!(channel.state(), ConnectionState::Accepting);
    channel
        .events()
        .send_carrier(&dev, true)
        .expect("send should not fail");

    let snap = channel.counters();
    assert_eq!(snap.dropped, 1);
    assert_eq!(snap.queued, 0);
    channel.stop();
}

#[test]
fn connect_dumps_then_forwards_events() {
    let registry = Arc::new(Registry::default());
    let dev = registry.insert(port(3));
    let channel = Channel::start(config("dump"), registry).expect("channel should start");

    let client = connect(&channel);
    let dump = read_dump(&client);
    assert!(matches!(&dump[0], Message::Ifinfo(info) if info.ifindex == 3));
    assert_eq!(dump.iter().filter(|m| **m == Message::Break).count(), 1);

    let dumped = dump.len() as u64;
    wait_for("dump sent", || channel.counters().sent == dumped);
    assert_eq!(channel.state(), ConnectionState::Active);

    channel
        .events()
        .send_carrier(&dev, true)
        .expect("carrier should queue");
    assert_eq!(
        read_message(&client),
        Message::Carrier(Carrier {
            ifindex: 3,
            on: true
        })
    );
    wait_for("carrier sent", || channel.counters().sent == dumped + 1);
    channel.stop();
}

#[test]
fn outbound_order_is_preserved() {
    let registry = Arc::new(Registry::default());
    let dev = registry.insert(port(3));
    let channel = Channel::start(config("fifo"), registry).expect("channel should start");

    let client = connect(&channel);
    read_dump(&client);

    let events = channel.events();
    for i in 0..64u32 {
        events
            .send_link_stat(&dev, i % 24, u64::from(i))
            .expect("stat should queue");
    }
    for i in 0..64u64 {
        match read_message(&client) {
            Message::LinkStat(stat) => assert_eq!(stat.count, i),
            other => panic!("expected link stat, got {other:?}"),
        }
    }
    channel.stop();
}

#[test]
fn each_connection_gets_exactly_one_dump() {
    let registry = Arc::new(Registry::default());
    registry.insert(port(3));
    registry.insert(port(4));
    let channel = Channel::start(config("reconnect"), registry).expect("channel should start");

    for round in 0..3 {
        let client = connect(&channel);
        let dump = read_dump(&client);
        let breaks = dump.iter().filter(|m| **m == Message::Break).count();
        assert_eq!(breaks, 1, "round {round}");
        drop(client);
        wait_for_teardown(&channel);
    }
    channel.stop();
}

#[test]
fn controller_updates_and_teardown_clear_carrier() {
    let registry = Arc::new(Registry::default());
    let dev = registry.insert(port(3));
    let channel = Channel::start(
        config("carrier"),
        Arc::clone(&registry) as Arc<dyn DeviceRegistry>,
    )
    .expect("channel should start");

    let client = connect(&channel);
    read_dump(&client);
    send(&client, Message::Carrier(Carrier { ifindex: 3, on: true }));
    wait_for("carrier on", || dev.carrier());

    drop(client);
    wait_for("carrier cleared", || !dev.carrier());
    wait_for("queue closed", || !channel.is_connected());
    channel.stop();
}

fn wait_for_teardown(channel: &Channel) {
    wait_for("teardown", || {
        channel.state() == ConnectionState::Accepting && channel.counters().connections == 0
    });
}

#[test]
fn published_stats_reset_on_reconnect() {
    let registry = Arc::new(Registry::new(vec!["rx-ok".into(), "tx-ok".into()]));
    let dev = registry.insert(port(3));
    let channel = Channel::start(config("stats"), registry).expect("channel should start");

    let client = connect(&channel);
    read_dump(&client);
    send(
        &client,
        Message::LinkStat(Stat {
            ifindex: 3,
            index: 0,
            count: 42,
        }),
    );
    send(
        &client,
        Message::EthtoolStat(Stat {
            ifindex: 3,
            index: 1,
            count: 7,
        }),
    );
    wait_for("stats written", || {
        dev.link_stat(0) == Some(42) && dev.ethtool_stat(1) == Some(7)
    });

    drop(client);
    wait_for_teardown(&channel);

    let client = connect(&channel);
    read_dump(&client);
    assert_eq!(dev.link_stat(0), Some(0));
    assert_eq!(dev.ethtool_stat(1), Some(0));
    channel.stop();
}

#[test]
fn backlog_is_discarded_on_disconnect() {
    let registry = Arc::new(Registry::default());
    let dev = registry.insert(port(3));
    let channel = Channel::start(config("backlog"), registry).expect("channel should start");

    // The controller stops reading, so the socket buffer fills up.
    let client = connect(&channel);
    let events = channel.events();
    for i in 0..20_000u32 {
        events
            .send_link_stat(&dev, i % 24, u64::from(i))
            .expect("stat should queue");
    }
    wait_for("send buffer full", || channel.counters().retries > 0);
    assert!(channel.counters().queued > 0);

    drop(client);
    wait_for_teardown(&channel);
    assert_eq!(channel.counters().queued, 0);

    let client = connect(&channel);
    assert!(matches!(read_message(&client), Message::Ifinfo(info) if info.ifindex == 3));
    let rest = read_dump(&client);
    assert!(rest.iter().all(|m| m.kind() != Kind::LinkStat));

    client
        .set_read_timeout(Some(Duration::from_millis(200)))
        .expect("read timeout should apply");
    let mut buf = vec![0u8; JUMBO_FRAME_SIZE];
    let err = client
        .recv(&mut buf)
        .expect_err("no stale frame should follow the dump");
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    channel.stop();
}

#[test]
fn malformed_frame_does_not_end_session() {
    let registry = Arc::new(Registry::default());
    let dev = registry.insert(port(3));
    let channel = Channel::start(
        config("malformed"),
        Arc::clone(&registry) as Arc<dyn DeviceRegistry>,
    )
    .expect("channel should start");

    let client = connect(&channel);
    read_dump(&client);
    client.send(&[0u8; 8]).expect("short frame should send");
    send(
        &client,
        Message::Speed(Speed {
            ifindex: 3,
            mbps: 100_000,
        }),
    );

    wait_for("speed applied", || dev.speed() == 100_000);
    assert_eq!(channel.counters().invalid, 1);
    assert_eq!(channel.state(), ConnectionState::Active);
    channel.stop();
}

#[test]
fn dump_fibinfo_is_answered_with_break() {
    let channel = Channel::start(config("fib"), Arc::new(Registry::default()))
        .expect("channel should start");

    let client = connect(&channel);
    read_dump(&client);
    send(&client, Message::DumpFibinfo);
    assert_eq!(read_message(&client).kind(), Kind::Break);
    channel.stop();
}

#[test]
fn name_in_use_is_reported_at_start() {
    let cfg = config("inuse");
    let first = Channel::start(cfg.clone(), Arc::new(Registry::default()))
        .expect("first channel should start");

    let second = Channel::start(cfg.clone(), Arc::new(Registry::default()));
    assert!(matches!(
        second,
        Err(ChannelError::Transport(TransportError::Bind { .. }))
    ));

    first.stop();
    let rebound = SeqpacketListener::bind(&cfg.name);
    assert!(rebound.is_ok(), "name should be free after stop");
}

#[test]
fn stop_during_active_session_completes() {
    let channel = Channel::start(config("stop"), Arc::new(Registry::default()))
        .expect("channel should start");
    let client = connect(&channel);
    read_dump(&client);

    let start = Instant::now();
    channel.stop();
    assert!(start.elapsed() < Duration::from_secs(2));

    let mut buf = [0u8; 64];
    assert_eq!(client.recv(&mut buf).expect("recv should see eof"), 0);
}
