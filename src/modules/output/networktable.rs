use nt::*;

use crate::error::{Error, Result};
use crate::modules::{OutputData, OutputModule};
use crate::settings::NetworkTableSettings;

use opencv::core::Mat;

use tokio::runtime::{Builder, Runtime};

use tracing::info;

/// Publishes the analyzer results to the robot's NetworkTables server.
pub struct NetworkTable {
	// keeps the client's connection task alive
	_runtime: Runtime,
	client: NetworkTables<Client>,

	displacement_id: u16,
	position_id: u16,
	fps_id: u16,
}

impl OutputModule for NetworkTable {
	fn run(&mut self, _frame: &Mat, data: &OutputData) -> Result<()> {
		self.client.update_entry(self.displacement_id, EntryValue::DoubleArray(vec![data.displacement.dx, data.displacement.dy]));
		self.client.update_entry(self.position_id, EntryValue::DoubleArray(vec![data.position.dx, data.position.dy]));
		self.client.update_entry(self.fps_id, EntryValue::Double(data.fps));
		Ok(())
	}
}

impl NetworkTable {
	pub fn connect(settings: &NetworkTableSettings) -> Result<Self> {
		let mut runtime = Builder::new().threaded_scheduler().enable_all().build()?;
		let ip = settings.ip.clone();

		let (client, displacement_id, position_id, fps_id) = runtime.block_on(async move {
			let client = NetworkTables::connect(&ip, "buggyvision").await.map_err(nt_error)?;

			let displacement_id = client.create_entry(EntryData::new("bv_displacement".to_string(), 0, EntryValue::DoubleArray(vec![0., 0.]))).await.map_err(nt_error)?;
			let position_id = client.create_entry(EntryData::new("bv_position".to_string(), 0, EntryValue::DoubleArray(vec![0., 0.]))).await.map_err(nt_error)?;
			let fps_id = client.create_entry(EntryData::new("bv_fps".to_string(), 0, EntryValue::Double(0.))).await.map_err(nt_error)?;

			Ok::<_, Error>((client, displacement_id, position_id, fps_id))
		})?;
		info!(ip = %settings.ip, "connected to networktables");

		Ok(Self {
			_runtime: runtime,
			client: client,

			displacement_id: displacement_id,
			position_id: position_id,
			fps_id: fps_id,
		})
	}
}

fn nt_error<E: std::fmt::Display>(err: E) -> Error {
	Error::Config(format!("networktables: {}", err))
}
