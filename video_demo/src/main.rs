//! Video lifecycle demo
//!
//! Builds a device, uploads a vertex buffer and a texture, clears a few
//! hundred frames, toggles vertical sync halfway through with a reinit, and
//! shuts down. Without a native backend compiled in it runs on a virtual
//! display.

use zeni_video::foundation::logging;
use zeni_video::prelude::*;
use zeni_video::render::backends::headless;

const APP_NAME: &str = "zeni_video_demo";
const FRAMES: u64 = 240;
const REINIT_AT: u64 = 120;

fn backends() -> BackendTable {
    let table = BackendTable::compiled();
    if table.is_empty() {
        log::warn!("No native backend compiled in; using a virtual display");
        BackendTable::new().with(
            BackendKind::OpenGl,
            headless::factory(BackendKind::OpenGl, VirtualDisplay::default()),
        )
    } else {
        table
    }
}

fn checker() -> Vec<u8> {
    let (light, dark) = ([0xee, 0xee, 0xee, 0xff], [0x22, 0x22, 0x22, 0xff]);
    [light, dark, dark, light].concat()
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let guardian = ConfigGuardian::new(ConfigPaths::for_application(APP_NAME)?);
    let mut video = VideoLifecycle::new(backends(), guardian, ResourceRegistry::new());
    video.subscribe(|event| log::info!("Device event: {:?}", event));

    match video.load_preinit_from_config() {
        Some(scope) => log::info!("Using {} configuration", scope),
        None => log::info!("Using default video settings"),
    }
    video.set_tt("Zenilib Video Demo", "Video Demo")?;

    let registry = video.registry().clone();
    let triangle = registry.adopt(VertexBuffer::new(
        "triangle",
        vec![Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, -0.5, 0.0), Vec3::new(0.0, 0.5, 0.0)],
    ));
    let textures = registry.adopt(TextureCache::default());

    {
        let device = video.get()?;
        triangle.borrow_mut().upload(device)?;
        textures.borrow_mut().insert(device, "checker", 2, 2, checker())?;
        log::info!(
            "{} device {}x{} with {} resources",
            device.backend(),
            device.screen_size().0,
            device.screen_size().1,
            device.live_resources()
        );
    }

    let mut timer = Timer::new();
    while timer.frame_count() < FRAMES {
        timer.update();

        if timer.frame_count() == REINIT_AT {
            let vertical_sync = !video.preinit().vertical_sync;
            if video.preinit_vertical_sync(vertical_sync) == PreinitEffect::PendingReinit {
                video.reinit()?;
            }
        }

        let pulse = 0.5 + 0.5 * timer.total_time().sin();
        let device = video.get()?;
        device.set_clear_color(Color::rgb(0.1, 0.1 + 0.3 * pulse, 0.2));
        device.present()?;
    }

    log::info!(
        "Presented {} frames at {:.1} fps on generation {}",
        timer.frame_count(),
        timer.average_fps(),
        video.generation()
    );
    video.destroy();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    log::info!("Starting video demo");
    match run() {
        Ok(()) => {
            log::info!("Video demo completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Video demo failed: {}", e);
            Err(e)
        }
    }
}
