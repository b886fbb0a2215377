//! Scripted runs of the coordination protocol between in-process devices.
//!
//! Every device is a full engine with its own worker thread and mock input
//! backends. Devices talk over a [`LoopbackHub`] and share one tokio timer
//! service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::ValueEnum;
use cooperate_adapters::mock::{LoopbackHub, MockEnvironment};
use cooperate_adapters::{TokioTimerManager, Transport};
use cooperate_engine::{Config, Cooperate, StartParams};
use cooperate_types::{Coordinate, CooperateStatus, DeviceId, NetworkId, PeerMessage, Pid};
use tracing::info;

/// Client pid used for every simulated request.
const CLIENT: Pid = Pid(1);

/// Keyboard/mouse device the simulated user starts from.
const START_DEVICE: DeviceId = DeviceId(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// A hands its input to B.
    Start,
    /// A hands its input to B, then B sends it back.
    ComeBack,
    /// A hands its input to B, then B passes it on to C.
    Relay,
    /// B tries to pass A's input on while A never answers.
    Timeout,
}

struct Device {
    name: &'static str,
    coop: Cooperate,
    mocks: MockEnvironment,
}

struct Network {
    hub: LoopbackHub,
    timer: TokioTimerManager,
    config: Config,
    wait: Duration,
}

impl Network {
    fn new(config: &Config) -> Self {
        Self {
            hub: LoopbackHub::new(),
            timer: TokioTimerManager::current(),
            config: config.clone(),
            wait: config.timing.relay_timeout() + Duration::from_secs(3),
        }
    }

    fn device(&self, name: &'static str) -> anyhow::Result<Device> {
        let mocks = MockEnvironment::new(name);
        mocks.input.set_display(self.config.display.geometry());
        let env = mocks.environment_with(
            Arc::new(self.hub.transport(name)),
            Arc::new(self.timer.clone()),
        );
        let mut coop = Cooperate::new(&self.config, env);
        self.hub.attach(name, coop.inbound_callback());
        coop.start_worker()
            .with_context(|| format!("failed to start device {name}"))?;
        coop.register_listener(CLIENT)?;
        Ok(Device { name, coop, mocks })
    }

    async fn start(&self, from: &Device, to: &Device) -> anyhow::Result<()> {
        info!(from = from.name, to = to.name, "start");
        from.coop
            .start(StartParams {
                pid: CLIENT,
                user_data: 1,
                remote_network_id: NetworkId::from(to.name),
                start_device_id: START_DEVICE,
            })
            .await
            .with_context(|| format!("{} could not start towards {}", from.name, to.name))
    }

    async fn expect(&self, device: &Device, status: CooperateStatus) -> anyhow::Result<()> {
        let mut rx = device.coop.status_receiver();
        let reached = tokio::time::timeout(self.wait, rx.wait_for(|s| *s == status)).await;
        match reached {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => bail!("{} stopped before reaching {status}", device.name),
            Err(_) => bail!(
                "{} is {} instead of {status}",
                device.name,
                device.coop.status()
            ),
        }
    }
}

/// Run `scenario` and print the resulting state of every device.
pub async fn run(scenario: Scenario, config: &Config) -> anyhow::Result<()> {
    let net = Network::new(config);
    let devices = match scenario {
        Scenario::Start => start(&net).await?,
        Scenario::ComeBack => come_back(&net).await?,
        Scenario::Relay => relay(&net).await?,
        Scenario::Timeout => timeout(&net).await?,
    };
    let mut stdout = std::io::stdout().lock();
    for device in &devices {
        report(device, &mut stdout)?;
    }
    drop(devices);
    net.timer.shutdown();
    Ok(())
}

async fn start(net: &Network) -> anyhow::Result<Vec<Device>> {
    let a = net.device("A")?;
    let b = net.device("B")?;
    net.start(&a, &b).await?;
    net.expect(&a, CooperateStatus::Out).await?;
    net.expect(&b, CooperateStatus::In).await?;
    Ok(vec![a, b])
}

async fn come_back(net: &Network) -> anyhow::Result<Vec<Device>> {
    let devices = start(net).await?;
    let (a, b) = (&devices[0], &devices[1]);
    net.start(b, a).await?;
    net.expect(b, CooperateStatus::Free).await?;
    net.expect(a, CooperateStatus::Free).await?;
    Ok(devices)
}

async fn relay(net: &Network) -> anyhow::Result<Vec<Device>> {
    let mut devices = start(net).await?;
    let c = net.device("C")?;
    net.start(&devices[1], &c).await?;
    net.expect(&devices[1], CooperateStatus::Free).await?;
    net.expect(&c, CooperateStatus::In).await?;
    net.expect(&devices[0], CooperateStatus::Out).await?;
    devices.push(c);
    Ok(devices)
}

async fn timeout(net: &Network) -> anyhow::Result<Vec<Device>> {
    // A takes part in the network but never answers.
    net.hub.attach("A", Box::new(|_, _| {}));
    let b = net.device("B")?;
    let c = net.device("C")?;

    net.hub
        .transport("A")
        .send(
            &NetworkId::from(b.name),
            PeerMessage::StartCooperate {
                origin: NetworkId::from("A"),
                cursor_pos: Coordinate::new(50, 50),
                pointer_speed: net.config.engine.pointer_speed,
                touchpad_speed: net.config.engine.touchpad_speed,
                uid: 1,
                options: None,
            },
        )
        .context("failed to reach B")?;
    net.expect(&b, CooperateStatus::In).await?;

    net.start(&b, &c).await?;
    net.expect(&b, CooperateStatus::Free).await?;
    Ok(vec![b, c])
}

fn report<W: std::io::Write>(device: &Device, w: &mut W) -> anyhow::Result<()> {
    writeln!(w, "== device {} ==", device.name)?;
    device.coop.dump(w)?;
    let notifications = device.mocks.notifier.for_pid(CLIENT);
    if !notifications.is_empty() {
        writeln!(w, "  notifications:")?;
        for notification in notifications {
            writeln!(w, "    {notification:?}")?;
        }
    }
    writeln!(w)?;
    Ok(())
}
