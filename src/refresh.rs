//! Periodic and externally-triggered epoch advancement.
//!
//! The controller fuses a periodic timer with a `SIGUSR1`/`SIGUSR2` listener
//! and a manual trigger channel into one wait. It never touches cache entries
//! directly — it only advances the shared epoch counter that `FileCache::get`
//! compares against on every lookup.

// self
use crate::_prelude::*;

/// Monotonically increasing generation counter, read concurrently from
/// every task calling `FileCache::get`, so it's backed by an atomic rather
/// than plain memory.
#[derive(Clone, Debug, Default)]
pub struct GlobalEpoch(Arc<std::sync::atomic::AtomicU64>);
impl GlobalEpoch {
	/// A fresh epoch counter starting at 0.
	pub fn new() -> Self {
		Self::default()
	}

	/// The current epoch.
	pub fn current(&self) -> u64 {
		self.0.load(std::sync::atomic::Ordering::Acquire)
	}

	/// Advance the epoch by one and return the new value.
	pub fn bump(&self) -> u64 {
		self.0.fetch_add(1, std::sync::atomic::Ordering::AcqRel) + 1
	}
}

/// What caused an epoch bump, for logging only.
#[derive(Clone, Copy, Debug)]
enum Trigger {
	Timer,
	Signal,
	Manual,
}

/// Lets callers request an out-of-band refresh without sending a Unix
/// signal: tests use this exclusively, and it's the natural hook for an
/// admin HTTP endpoint.
#[derive(Clone, Debug)]
pub struct RefreshHandle {
	trigger: tokio::sync::mpsc::Sender<()>,
}
impl RefreshHandle {
	/// Request an immediate epoch bump.
	pub async fn trigger(&self) -> Result<()> {
		self.trigger.send(()).await.map_err(|_| Error::WorkerPoolClosed)
	}
}

/// Background task owning the periodic timer and refresh signal sources.
pub struct Controller {
	epoch: GlobalEpoch,
	interval: Duration,
	manual: tokio::sync::mpsc::Receiver<()>,
}
impl Controller {
	/// Build a controller bumping `epoch` every `interval`, plus on demand
	/// via the returned [`RefreshHandle`] or a Unix signal.
	pub fn new(epoch: GlobalEpoch, interval: Duration) -> (Self, RefreshHandle) {
		let (tx, rx) = tokio::sync::mpsc::channel(8);

		(Self { epoch, interval, manual: rx }, RefreshHandle { trigger: tx })
	}

	/// Run the controller until its manual-trigger channel is dropped.
	pub async fn run(mut self) {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		#[cfg(unix)]
		let mut usr1 = install_signal(tokio::signal::unix::SignalKind::user_defined1());
		#[cfg(unix)]
		let mut usr2 = install_signal(tokio::signal::unix::SignalKind::user_defined2());

		loop {
			#[cfg(unix)]
			let trigger = tokio::select! {
				_ = ticker.tick() => Some(Trigger::Timer),
				_ = wait_signal(&mut usr1) => Some(Trigger::Signal),
				_ = wait_signal(&mut usr2) => Some(Trigger::Signal),
				received = self.manual.recv() => received.map(|()| Trigger::Manual),
			};
			#[cfg(not(unix))]
			let trigger = tokio::select! {
				_ = ticker.tick() => Some(Trigger::Timer),
				received = self.manual.recv() => received.map(|()| Trigger::Manual),
			};

			match trigger {
				Some(trigger) => {
					let epoch = self.epoch.bump();
					tracing::debug!(?trigger, epoch, "cache epoch advanced");
				},
				None => {
					tracing::debug!("refresh controller shutting down, manual trigger channel closed");
					break;
				},
			}
		}
	}
}

#[cfg(unix)]
fn install_signal(kind: tokio::signal::unix::SignalKind) -> Option<tokio::signal::unix::Signal> {
	match tokio::signal::unix::signal(kind) {
		Ok(signal) => Some(signal),
		Err(err) => {
			tracing::warn!(error = %err, "failed to install refresh signal handler");
			None
		},
	}
}

#[cfg(unix)]
async fn wait_signal(signal: &mut Option<tokio::signal::unix::Signal>) {
	match signal {
		Some(signal) => {
			signal.recv().await;
		},
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn manual_trigger_bumps_epoch() {
		let epoch = GlobalEpoch::new();
		let (controller, handle) = Controller::new(epoch.clone(), Duration::from_secs(3600));
		let task = tokio::spawn(controller.run());

		assert_eq!(epoch.current(), 0);
		handle.trigger().await.unwrap();

		// give the controller a chance to process the message
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(epoch.current(), 1);

		task.abort();
	}

	#[tokio::test]
	async fn dropping_the_handle_stops_the_controller() {
		let epoch = GlobalEpoch::new();
		let (controller, handle) = Controller::new(epoch, Duration::from_secs(3600));
		let task = tokio::spawn(controller.run());

		drop(handle);
		tokio::time::timeout(Duration::from_secs(1), task).await.expect("controller should exit promptly").unwrap();
	}
}
