mod common;

use std::time::Duration;

use common::{Behavior, FakeDevice, fast_options};
use tuya_sunrise_rs::{
    Command, Controller, CurvePoint, Device, DeviceReport, Dps, Error, PowerMode, Version,
    WorkMode,
};

#[tokio::test]
async fn test_control_and_status() {
    let fake = FakeDevice::start(Behavior::Answer, Version::V33).await;
    let mut device = Device::open(fake.descriptor("bf01"), fast_options()).await.unwrap();

    device.set_white(&CurvePoint::new(0.0, 10, 0)).await.unwrap();
    assert_eq!(device.sequence(), 1);

    let status = device.status().await.unwrap();
    assert_eq!(device.sequence(), 2);
    assert_eq!(status.power(), Some(PowerMode::On));
    assert_eq!(status.mode(), Some(WorkMode::White));
    assert_eq!(status.brightness().unwrap().value(), 500);
    assert_eq!(status.raw().len(), 5);

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].command, Command::Control);
    let dps = &requests[0].payload.as_ref().unwrap()["dps"];
    assert_eq!(dps["20"], true);
    assert_eq!(dps["21"], "white");
    assert_eq!(dps["22"], 10);
    assert_eq!(dps["23"], 0);
    assert_eq!(requests[1].command, Command::DpQuery);
    assert_eq!(requests[1].payload.as_ref().unwrap()["gwId"], "bf01");

    device.close().await;
    device.close().await;
    assert!(!device.is_connected());
}

#[tokio::test]
async fn test_plaintext_version() {
    let fake = FakeDevice::start(Behavior::Answer, Version::V31).await;
    let mut device = Device::new(fake.descriptor("bf31"), fast_options());
    device.turn_on().await.unwrap();
    assert_eq!(fake.requests()[0].payload.as_ref().unwrap()["dps"]["20"], true);
}

#[tokio::test]
async fn test_hang_up_is_retried_once() {
    let fake = FakeDevice::start(Behavior::HangUpFirst, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf02"), fast_options());

    device.turn_on().await.unwrap();
    assert_eq!(fake.accepts(), 2);
    // The retry runs on a fresh connection, so numbering restarts
    assert_eq!(device.sequence(), 1);
}

#[tokio::test]
async fn test_timeout_is_retried_once() {
    let fake = FakeDevice::start(Behavior::SilentFirst, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf03"), fast_options());

    let status = device.status().await.unwrap();
    assert!(status.emitting());
    assert_eq!(fake.accepts(), 2);
}

#[tokio::test]
async fn test_second_timeout_is_surfaced() {
    let fake = FakeDevice::start(Behavior::Silent, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf12"), fast_options());

    let err = device.status().await.unwrap_err();
    assert!(matches!(err, Error::DeviceTimeout { .. }));
    assert_eq!(fake.accepts(), 2);
    assert_eq!(fake.requests().len(), 2);
    assert!(!device.is_connected());
}

#[tokio::test]
async fn test_heartbeat() {
    let fake = FakeDevice::start(Behavior::Answer, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf13"), fast_options());

    device.heartbeat().await.unwrap();
    device.heartbeat().await.unwrap();
    assert_eq!(device.sequence(), 2);

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.command == Command::HeartBeat));
    assert_eq!(fake.accepts(), 1);
}

#[tokio::test]
async fn test_stale_frames_are_skipped() {
    let fake = FakeDevice::start(Behavior::StaleFirst, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf04"), fast_options());

    device.turn_on().await.unwrap();
    device.turn_off().await.unwrap();
    assert_eq!(fake.accepts(), 1);
}

#[tokio::test]
async fn test_only_stale_frames_is_a_mismatch() {
    let fake = FakeDevice::start(Behavior::OnlyStale, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf05"), fast_options());

    let err = device.turn_on().await.unwrap_err();
    assert!(matches!(
        err,
        Error::SequenceMismatch {
            expected: 1,
            received: 101
        }
    ));
    assert_eq!(fake.accepts(), 1);
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let fake = FakeDevice::start(Behavior::Reject(7), Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf06"), fast_options());

    let err = device.turn_on().await.unwrap_err();
    assert!(matches!(err, Error::DeviceRejected { code: 7, .. }));
    assert_eq!(fake.accepts(), 1);
}

#[tokio::test]
async fn test_empty_dps_is_refused() {
    let fake = FakeDevice::start(Behavior::Answer, Version::V33).await;
    let mut device = Device::new(fake.descriptor("bf07"), fast_options());

    assert!(matches!(device.set_dps(&Dps::new()).await, Err(Error::NoAttribute)));
    assert_eq!(fake.accepts(), 0);
}

#[tokio::test]
async fn test_query_status_reports_unreachable() {
    let fake = FakeDevice::start(Behavior::Answer, Version::V33).await;
    let mut gone = fake.descriptor("bf08");
    // Nothing listens on the port once the placeholder listener is dropped
    let placeholder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    gone.port = placeholder.local_addr().unwrap().port();
    drop(placeholder);

    let controller = Controller::new(fast_options());
    assert!(controller.query_status(&fake.descriptor("bf09")).await.is_reachable());
    assert!(matches!(
        controller.query_status(&gone).await,
        DeviceReport::Unreachable(_)
    ));

    let all = controller.query_all(&[fake.descriptor("bf10"), gone]).await;
    assert_eq!(all.len(), 2);
    assert!(all[0].1.is_reachable());
    assert!(!all[1].1.is_reachable());
}

#[tokio::test]
async fn test_short_ramp_against_fake_device() {
    let fake = FakeDevice::start(Behavior::Answer, Version::V33).await;
    let controller = Controller::new(fast_options());

    let report = controller
        .run_test_ramp(&[fake.descriptor("bf11")], Duration::from_secs(3))
        .await
        .unwrap();
    assert!(report.completed());
    assert!(report.bulbs[0].applied >= 3);
    assert_eq!(report.bulbs[0].failures, 0);

    let requests = fake.requests();
    let last = &requests.last().unwrap().payload.as_ref().unwrap()["dps"];
    assert_eq!(last["22"], 1000);
    assert_eq!(last["23"], 650);
    assert!(!controller.is_active());
}
