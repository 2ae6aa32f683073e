//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use zeni_video::config::{ConfigGuardian, ConfigPaths};
use zeni_video::foundation::fs::{FileSystem, StdFileSystem};
use zeni_video::render::backends::headless::{HeadlessDevice, VirtualDisplay};
use zeni_video::render::device::{Device, DeviceProperties, GpuHandle, RenderState, ResourceDesc, ResourceTable};
use zeni_video::render::{
    BackendKind, BackendTable, DeviceParams, DeviceResult, ResettableResource, ResourceKind, ResourceRegistry,
    VideoLifecycle, WindowIcon,
};

/// Ordered record of everything the tests observe
pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

/// One file-system call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsOp {
    Copy { from: PathBuf, to: PathBuf, ok: bool },
    Delete(PathBuf),
    CreateDir(PathBuf),
    Write(PathBuf),
    Read(PathBuf),
}

/// [`StdFileSystem`] that records every call and can refuse directory creation
pub struct RecordingFileSystem {
    ops: Rc<RefCell<Vec<FsOp>>>,
    refuse_directories: bool,
}

impl RecordingFileSystem {
    pub fn new(ops: &Rc<RefCell<Vec<FsOp>>>) -> Self {
        Self {
            ops: Rc::clone(ops),
            refuse_directories: false,
        }
    }

    pub fn refusing_directories(mut self) -> Self {
        self.refuse_directories = true;
        self
    }
}

impl FileSystem for RecordingFileSystem {
    fn copy_file(&self, src: &Path, dst: &Path) -> bool {
        let ok = StdFileSystem.copy_file(src, dst);
        self.ops.borrow_mut().push(FsOp::Copy {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            ok,
        });
        ok
    }

    fn delete_file(&self, path: &Path) -> bool {
        self.ops.borrow_mut().push(FsOp::Delete(path.to_path_buf()));
        StdFileSystem.delete_file(path)
    }

    fn create_directory(&self, path: &Path) -> bool {
        self.ops.borrow_mut().push(FsOp::CreateDir(path.to_path_buf()));
        !self.refuse_directories && StdFileSystem.create_directory(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> bool {
        self.ops.borrow_mut().push(FsOp::Write(path.to_path_buf()));
        StdFileSystem.write_file(path, contents)
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        self.ops.borrow_mut().push(FsOp::Read(path.to_path_buf()));
        StdFileSystem.read_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        StdFileSystem.exists(path)
    }
}

/// Temporary application layout: `<tmp>/appdata` and `<tmp>/app/config`
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub paths: ConfigPaths,
    pub ops: Rc<RefCell<Vec<FsOp>>>,
}

impl Sandbox {
    pub fn new() -> Self {
        zeni_video::foundation::logging::init_for_tests();
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path().join("appdata"), dir.path().join("app"));
        std::fs::create_dir_all(paths.local.current.parent().unwrap()).unwrap();
        Self {
            dir,
            paths,
            ops: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn guardian(&self) -> ConfigGuardian {
        ConfigGuardian::with_file_system(self.paths.clone(), Box::new(RecordingFileSystem::new(&self.ops)))
    }

    pub fn lifecycle(&self, table: BackendTable) -> VideoLifecycle {
        VideoLifecycle::new(table, self.guardian(), ResourceRegistry::new())
    }

    pub fn copies(&self) -> Vec<FsOp> {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, FsOp::Copy { .. }))
            .cloned()
            .collect()
    }

    pub fn write(&self, path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn read(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// Headless device that journals its construction and teardown
pub struct TracedDevice {
    inner: HeadlessDevice,
    journal: Journal,
}

impl Device for TracedDevice {
    fn properties(&self) -> &DeviceProperties {
        self.inner.properties()
    }

    fn render_state(&self) -> &RenderState {
        self.inner.render_state()
    }

    fn render_state_mut(&mut self) -> &mut RenderState {
        self.inner.render_state_mut()
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.inner.present()
    }

    fn set_caption(&mut self, title: &str, taskmsg: &str) -> DeviceResult<()> {
        self.inner.set_caption(title, taskmsg)
    }

    fn set_icon(&mut self, icon: &WindowIcon) -> DeviceResult<()> {
        self.inner.set_icon(icon)
    }

    fn create_resource(&mut self, desc: ResourceDesc) -> DeviceResult<GpuHandle> {
        self.inner.create_resource(desc)
    }

    fn destroy_resource(&mut self, handle: GpuHandle) -> bool {
        self.inner.destroy_resource(handle)
    }

    fn resources(&self) -> &ResourceTable {
        self.inner.resources()
    }
}

impl Drop for TracedDevice {
    fn drop(&mut self) {
        self.journal
            .borrow_mut()
            .push(format!("teardown {}", self.inner.generation()));
    }
}

/// Factory for traced headless devices of `kind`
pub fn traced(
    kind: BackendKind,
    display: VirtualDisplay,
    journal: &Journal,
) -> impl Fn(&DeviceParams) -> DeviceResult<Box<dyn Device>> {
    let journal = Rc::clone(journal);
    move |params| {
        let inner = HeadlessDevice::new(kind, display, params)?;
        journal.borrow_mut().push(format!("construct {}", params.generation));
        Ok(Box::new(TracedDevice {
            inner,
            journal: Rc::clone(&journal),
        }) as Box<dyn Device>)
    }
}

/// Resource that journals its hooks and holds one GPU handle
pub struct TracedResource {
    pub name: &'static str,
    pub kind: ResourceKind,
    pub handle: Option<GpuHandle>,
    journal: Journal,
}

impl TracedResource {
    pub fn new(name: &'static str, kind: ResourceKind, journal: &Journal) -> Self {
        Self {
            name,
            kind,
            handle: None,
            journal: Rc::clone(journal),
        }
    }

    pub fn load(&mut self, device: &mut dyn Device) {
        self.handle = Some(
            device
                .create_resource(ResourceDesc::new(self.kind, self.name, 16))
                .unwrap(),
        );
    }
}

impl ResettableResource for TracedResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn lose_resources(&mut self, device: &mut dyn Device) {
        self.journal.borrow_mut().push(format!("lose {}", self.name));
        if let Some(handle) = self.handle.take() {
            device.destroy_resource(handle);
        }
    }

    fn reload_resources(&mut self, device: &mut dyn Device) -> DeviceResult<()> {
        self.journal.borrow_mut().push(format!("reload {}", self.name));
        self.handle = Some(device.create_resource(ResourceDesc::new(self.kind, self.name, 16))?);
        Ok(())
    }
}
