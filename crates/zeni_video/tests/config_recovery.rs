mod common;

use common::{FsOp, RecordingFileSystem, Sandbox};
use zeni_video::config::{Config, ConfigFormat, ConfigGuardian, ConfigScope, HealReport, VideoConfig};
use zeni_video::render::backends::headless::{self, VirtualDisplay};
use zeni_video::render::{BackendKind, BackendTable, ResourceRegistry, VideoLifecycle, VideoMode};

fn config_text(api: &str, width: i32, height: i32) -> String {
    let mut config = VideoConfig::conservative();
    config.zenilib.video.api = api.to_string();
    config.zenilib.video.resolution.width = width;
    config.zenilib.video.resolution.height = height;
    config.to_config_string(ConfigFormat::Toml).unwrap()
}

fn parse(text: &str) -> VideoConfig {
    VideoConfig::from_config_str(text, ConfigFormat::Toml).unwrap()
}

fn opengl_table(display: VirtualDisplay) -> BackendTable {
    BackendTable::new().with(BackendKind::OpenGl, headless::factory(BackendKind::OpenGl, display))
}

#[test]
fn test_heal_restores_user_backup() {
    let sandbox = Sandbox::new();
    let known_good = config_text("OpenGL", 640, 480);
    sandbox.write(&sandbox.paths.user.current, "[Zenilib.Video]\nAPI = \"Glide\"\n");
    sandbox.write(&sandbox.paths.user.backup, &known_good);
    sandbox.write(&sandbox.paths.local.backup, &config_text("Vulkan", 320, 200));

    let mut video = sandbox.lifecycle(BackendTable::new());
    assert!(video.get().err().unwrap().is_init_failure());

    assert_eq!(sandbox.read(&sandbox.paths.user.current).as_deref(), Some(known_good.as_str()));
    assert!(!sandbox.paths.user.backup.exists());
    // The local pair is only consulted when the user backup is missing
    assert!(sandbox.paths.local.backup.exists());
    assert_eq!(sandbox.read(&sandbox.paths.local.current), None);
}

#[test]
fn test_heal_falls_back_to_local_backup() {
    let sandbox = Sandbox::new();
    let local_good = config_text("Vulkan", 1280, 720);
    sandbox.write(&sandbox.paths.local.backup, &local_good);

    let report = sandbox.guardian().heal();
    assert_eq!(
        report,
        HealReport::Restored {
            scope: ConfigScope::Local,
            backup_removed: true
        }
    );
    assert_eq!(sandbox.read(&sandbox.paths.local.current), Some(local_good));
    assert!(!sandbox.paths.local.backup.exists());
}

#[test]
fn test_heal_without_backups_writes_defaults_everywhere() {
    let sandbox = Sandbox::new();
    let mut video = sandbox.lifecycle(BackendTable::new());
    assert!(video.get().is_err());

    let user = sandbox.read(&sandbox.paths.user.current).unwrap();
    let local = sandbox.read(&sandbox.paths.local.current).unwrap();
    assert_eq!(parse(&user), VideoConfig::conservative());
    assert_eq!(parse(&local), VideoConfig::conservative());

    let defaults = parse(&user);
    assert_eq!(defaults.resolution(), Some((800, 600)));
    assert_eq!(defaults.zenilib.video.multisampling, 0);
    assert!(!defaults.zenilib.video.full_screen);
    assert!(defaults.zenilib.textures.mipmapping);
}

#[test]
fn test_defaults_reach_local_scope_when_user_dir_is_refused() {
    let sandbox = Sandbox::new();
    let guardian = ConfigGuardian::with_file_system(
        sandbox.paths.clone(),
        Box::new(RecordingFileSystem::new(&sandbox.ops).refusing_directories()),
    );

    let report = guardian.heal();
    assert_eq!(
        report,
        HealReport::Defaults {
            user_written: false,
            local_written: true
        }
    );
    assert!(sandbox.read(&sandbox.paths.user.current).is_none());
    assert!(sandbox.read(&sandbox.paths.local.current).is_some());
    assert!(!sandbox.ops.borrow().contains(&FsOp::Write(sandbox.paths.user.current.clone())));
}

#[test]
fn test_first_get_snapshots_local_config_into_user_scope() {
    let sandbox = Sandbox::new();
    let local = config_text("OpenGL", 1024, 768);
    sandbox.write(&sandbox.paths.local.current, &local);

    let mut video = sandbox.lifecycle(opengl_table(VirtualDisplay::default()));
    video.get().unwrap();

    assert_eq!(sandbox.read(&sandbox.paths.user.current).as_deref(), Some(local.as_str()));
    assert_eq!(sandbox.read(&sandbox.paths.user.backup), Some(local));

    // Later calls and reinit never snapshot again
    let copies = sandbox.copies().len();
    video.get().unwrap();
    video.reinit().unwrap();
    assert_eq!(sandbox.copies().len(), copies);
}

#[test]
fn test_snapshot_prefers_user_config() {
    let sandbox = Sandbox::new();
    let user = config_text("Vulkan", 800, 600);
    sandbox.write(&sandbox.paths.user.current, &user);
    sandbox.write(&sandbox.paths.local.current, &config_text("OpenGL", 320, 240));

    let report = sandbox.guardian().snapshot();
    assert_eq!(report.source, Some(ConfigScope::User));

    for path in [&sandbox.paths.user.backup, &sandbox.paths.local.current, &sandbox.paths.local.backup] {
        assert_eq!(sandbox.read(path).as_deref(), Some(user.as_str()), "{}", path.display());
    }
}

#[test]
fn test_preinit_loaded_from_config_drives_construction() {
    let sandbox = Sandbox::new();
    sandbox.write(&sandbox.paths.user.current, &config_text("DX9", 1024, 768));

    let display = VirtualDisplay::new(1920, 1080);
    let table = opengl_table(display).with(BackendKind::Vulkan, headless::factory(BackendKind::Vulkan, display));
    let mut video = sandbox.lifecycle(table);

    assert_eq!(video.load_preinit_from_config(), Some(ConfigScope::User));
    assert_eq!(video.preinit().video_mode, VideoMode::Vulkan);
    assert_eq!(video.preinit().resolution, Some((1024, 768)));

    let device = video.get().unwrap();
    assert_eq!(device.backend(), BackendKind::Vulkan);
    assert_eq!(device.screen_size(), (1024, 768));
}

#[test]
fn test_unreadable_config_keeps_defaults() {
    let sandbox = Sandbox::new();
    sandbox.write(&sandbox.paths.user.current, "this is not toml = = =");

    let mut video = VideoLifecycle::new(BackendTable::new(), sandbox.guardian(), ResourceRegistry::new());
    assert_eq!(video.load_preinit_from_config(), None);
    assert_eq!(video.preinit().video_mode, VideoMode::Any);
}

#[test]
fn test_unparsable_user_config_never_reaches_backups() {
    let sandbox = Sandbox::new();
    let local = config_text("OpenGL", 640, 480);
    sandbox.write(&sandbox.paths.user.current, "garbage = = =");
    sandbox.write(&sandbox.paths.local.current, &local);

    let mut video = sandbox.lifecycle(opengl_table(VirtualDisplay::default()));
    assert_eq!(video.load_preinit_from_config(), Some(ConfigScope::Local));
    assert_eq!(video.get().unwrap().screen_size(), (640, 480));

    // The configuration that built the device replaces the broken one
    for path in [&sandbox.paths.local.current, &sandbox.paths.user.current, &sandbox.paths.user.backup] {
        assert_eq!(sandbox.read(path).as_deref(), Some(local.as_str()), "{}", path.display());
    }
}

#[test]
fn test_snapshot_without_user_dir_only_backs_up_local() {
    let sandbox = Sandbox::new();
    let local = config_text("Vulkan", 800, 600);
    sandbox.write(&sandbox.paths.local.current, &local);
    let guardian = ConfigGuardian::with_file_system(
        sandbox.paths.clone(),
        Box::new(RecordingFileSystem::new(&sandbox.ops).refusing_directories()),
    );

    let report = guardian.snapshot();

    assert!(!report.user_dir_ready);
    assert_eq!(report.source, Some(ConfigScope::Local));
    assert_eq!(
        sandbox.copies(),
        vec![FsOp::Copy {
            from: sandbox.paths.local.current.clone(),
            to: sandbox.paths.local.backup.clone(),
            ok: true,
        }]
    );
    assert!(!sandbox.ops.borrow().iter().any(|op| matches!(op, FsOp::Write(_))));
    assert_eq!(sandbox.read(&sandbox.paths.local.backup), Some(local));
    assert!(!sandbox.paths.user.current.exists());
    assert!(!sandbox.paths.user.backup.exists());
}
