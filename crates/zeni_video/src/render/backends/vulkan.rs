//! Vulkan backend
//!
//! A GLFW window without a client API plus the Vulkan objects needed to put
//! a cleared frame on screen: instance, surface, logical device, swapchain
//! and one set of frame synchronization objects. Every wrapper destroys its
//! own handle on drop, so a construction that fails half way releases what
//! it already created.

use std::ffi::{CStr, CString};

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Entry, Instance};

use crate::render::backends::glfw_window::{ClientApi, NativeWindow};
use crate::render::backends::{BackendKind, DeviceParams};
use crate::render::device::{Device, DeviceProperties, GpuHandle, RenderState, ResourceDesc, ResourceTable};
use crate::render::error::{DeviceError, DeviceResult};
use crate::render::window::WindowIcon;

fn init_error(reason: impl Into<String>) -> DeviceError {
    DeviceError::construction(BackendKind::Vulkan, reason)
}

fn api_error(what: &str) -> impl Fn(vk::Result) -> DeviceError + '_ {
    move |result| init_error(format!("{}: {:?}", what, result))
}

/// Vulkan instance wrapper with RAII cleanup
struct VulkanInstance {
    // Keeps the loader library alive for as long as the instance
    _entry: Entry,
    instance: Instance,
    surface_loader: SurfaceLoader,
}

impl VulkanInstance {
    fn new(window: &NativeWindow, app_name: &str) -> DeviceResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| init_error(format!("Failed to load Vulkan: {:?}", e)))?;

        let app_name = CString::new(app_name).map_err(|e| init_error(e.to_string()))?;
        let engine_name = CString::new("zeni_video").map_err(|e| init_error(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required = window
            .glfw()
            .get_required_instance_extensions()
            .ok_or_else(|| init_error("GLFW reports no Vulkan support"))?;
        let required: Vec<CString> = required
            .into_iter()
            .map(CString::new)
            .collect::<Result<_, _>>()
            .map_err(|e| init_error(e.to_string()))?;
        let extensions: Vec<*const std::os::raw::c_char> = required.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(api_error("Instance creation"))?;
        let surface_loader = SurfaceLoader::new(&entry, &instance);

        Ok(Self {
            _entry: entry,
            instance,
            surface_loader,
        })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe { self.instance.destroy_instance(None) };
    }
}

/// Window surface, destroyed before the instance
struct WindowSurface {
    loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
}

impl WindowSurface {
    fn new(window: &mut NativeWindow, instance: &VulkanInstance) -> DeviceResult<Self> {
        let mut surface = vk::SurfaceKHR::null();
        let result =
            window
                .window_mut()
                .create_window_surface(instance.instance.handle(), std::ptr::null(), &mut surface);
        if result != vk::Result::SUCCESS {
            return Err(init_error(format!("Surface creation: {:?}", result)));
        }
        Ok(Self {
            loader: instance.surface_loader.clone(),
            surface,
        })
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}

/// Physical device selection
struct PhysicalDeviceInfo {
    device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
}

impl PhysicalDeviceInfo {
    fn select(instance: &VulkanInstance, surface: &WindowSurface) -> DeviceResult<Self> {
        let devices =
            unsafe { instance.instance.enumerate_physical_devices() }.map_err(api_error("Device enumeration"))?;

        for device in devices {
            match Self::evaluate(instance, surface, device) {
                Ok(info) => {
                    let properties = unsafe { instance.instance.get_physical_device_properties(device) };
                    log::info!("Selected GPU: {}", unsafe {
                        CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy()
                    });
                    return Ok(info);
                }
                Err(e) => log::debug!("Skipping GPU: {}", e),
            }
        }

        Err(init_error("No suitable GPU found"))
    }

    fn evaluate(instance: &VulkanInstance, surface: &WindowSurface, device: vk::PhysicalDevice) -> DeviceResult<Self> {
        let families = unsafe { instance.instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }
            let present_support = unsafe {
                surface
                    .loader
                    .get_physical_device_surface_support(device, index, surface.surface)
            }
            .map_err(api_error("Surface support query"))?;
            if present_support && present_family.is_none() {
                present_family = Some(index);
            }
        }

        let extensions = unsafe { instance.instance.enumerate_device_extension_properties(device) }
            .map_err(api_error("Extension enumeration"))?;
        let has_swapchain = extensions
            .iter()
            .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == SwapchainLoader::name());
        if !has_swapchain {
            return Err(init_error("Swapchain extension not supported"));
        }

        Ok(Self {
            device,
            graphics_family: graphics_family.ok_or_else(|| init_error("No graphics queue family found"))?,
            present_family: present_family.ok_or_else(|| init_error("No present queue family found"))?,
        })
    }

    fn families(&self) -> Vec<u32> {
        if self.graphics_family == self.present_family {
            vec![self.graphics_family]
        } else {
            vec![self.graphics_family, self.present_family]
        }
    }
}

/// Logical device wrapper with RAII cleanup
struct LogicalDevice {
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl LogicalDevice {
    fn new(instance: &VulkanInstance, physical: &PhysicalDeviceInfo) -> DeviceResult<Self> {
        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical
            .families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = [SwapchainLoader::name().as_ptr()];
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions);

        let device = unsafe { instance.instance.create_device(physical.device, &create_info, None) }
            .map_err(api_error("Device creation"))?;
        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Swapchain whose images are cleared by transfer commands
struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    extent: vk::Extent2D,
}

impl Swapchain {
    fn new(
        instance: &VulkanInstance,
        device: &LogicalDevice,
        surface: &WindowSurface,
        physical: &PhysicalDeviceInfo,
        window_extent: vk::Extent2D,
        vertical_sync: bool,
    ) -> DeviceResult<Self> {
        let loader = SwapchainLoader::new(&instance.instance, &device.device);

        let caps = unsafe {
            surface
                .loader
                .get_physical_device_surface_capabilities(physical.device, surface.surface)
        }
        .map_err(api_error("Surface capabilities"))?;
        if !caps.supported_usage_flags.contains(vk::ImageUsageFlags::TRANSFER_DST) {
            return Err(init_error("Swapchain images cannot be cleared"));
        }

        let formats = unsafe {
            surface
                .loader
                .get_physical_device_surface_formats(physical.device, surface.surface)
        }
        .map_err(api_error("Surface formats"))?;
        let format = formats
            .iter()
            .find(|sf| sf.format == vk::Format::B8G8R8A8_UNORM && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| init_error("Surface reports no formats"))?;

        let present_modes = unsafe {
            surface
                .loader
                .get_physical_device_surface_present_modes(physical.device, surface.surface)
        }
        .map_err(api_error("Present modes"))?;
        let present_mode = if vertical_sync {
            vk::PresentModeKHR::FIFO
        } else {
            [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
                .into_iter()
                .find(|mode| present_modes.contains(mode))
                .unwrap_or(vk::PresentModeKHR::FIFO)
        };

        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: window_extent
                    .width
                    .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                height: window_extent
                    .height
                    .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
            }
        };

        let image_count = if caps.max_image_count > 0 {
            (caps.min_image_count + 1).min(caps.max_image_count)
        } else {
            caps.min_image_count + 1
        };

        let families = physical.families();
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);
        let create_info = if families.len() > 1 {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain =
            unsafe { loader.create_swapchain(&create_info, None) }.map_err(api_error("Swapchain creation"))?;
        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(api_error("Swapchain images")(e));
            }
        };

        Ok(Self {
            loader,
            swapchain,
            images,
            extent,
        })
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
    }
}

/// Command recording and synchronization for one frame in flight
struct FrameSync {
    device: ash::Device,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

impl FrameSync {
    fn new(device: &LogicalDevice, physical: &PhysicalDeviceInfo) -> DeviceResult<Self> {
        let raw = device.device.clone();
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(physical.graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool =
            unsafe { raw.create_command_pool(&pool_info, None) }.map_err(api_error("Command pool creation"))?;

        // From here on, Drop releases whatever was created
        let mut sync = Self {
            device: raw,
            command_pool,
            command_buffer: vk::CommandBuffer::null(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { sync.device.allocate_command_buffers(&alloc_info) }
            .map_err(api_error("Command buffer allocation"))?;
        sync.command_buffer = buffers
            .first()
            .copied()
            .ok_or_else(|| init_error("No command buffer allocated"))?;

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        sync.image_available =
            unsafe { sync.device.create_semaphore(&semaphore_info, None) }.map_err(api_error("Semaphore creation"))?;
        sync.render_finished =
            unsafe { sync.device.create_semaphore(&semaphore_info, None) }.map_err(api_error("Semaphore creation"))?;

        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
        sync.in_flight = unsafe { sync.device.create_fence(&fence_info, None) }.map_err(api_error("Fence creation"))?;

        Ok(sync)
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            if self.in_flight != vk::Fence::null() {
                self.device.destroy_fence(self.in_flight, None);
            }
            for semaphore in [self.image_available, self.render_finished] {
                if semaphore != vk::Semaphore::null() {
                    self.device.destroy_semaphore(semaphore, None);
                }
            }
            // Frees the command buffer as well
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Build a Vulkan device
pub fn construct(params: &DeviceParams) -> DeviceResult<Box<dyn Device>> {
    VulkanDevice::new(params).map(|d| Box::new(d) as Box<dyn Device>)
}

/// Device backed by a Vulkan swapchain
pub struct VulkanDevice {
    // Drop order matters: frame objects, swapchain, device, surface, instance, window
    frame: FrameSync,
    swapchain: Swapchain,
    device: LogicalDevice,
    _surface: WindowSurface,
    _instance: VulkanInstance,
    window: NativeWindow,
    properties: DeviceProperties,
    state: RenderState,
    resources: ResourceTable,
}

impl VulkanDevice {
    /// Open a window and build the Vulkan objects for it
    pub fn new(params: &DeviceParams) -> DeviceResult<Self> {
        let mut window = NativeWindow::open(BackendKind::Vulkan, ClientApi::NoApi, params)?;
        let instance = VulkanInstance::new(&window, &params.title)?;
        let surface = WindowSurface::new(&mut window, &instance)?;
        let physical = PhysicalDeviceInfo::select(&instance, &surface)?;
        let device = LogicalDevice::new(&instance, &physical)?;

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(
            &instance,
            &device,
            &surface,
            &physical,
            vk::Extent2D { width, height },
            params.vertical_sync(),
        )?;
        let frame = FrameSync::new(&device, &physical)?;

        let screen_size = (swapchain.extent.width, swapchain.extent.height);
        log::info!(
            "Vulkan device {}x{} with {} swapchain images (generation {})",
            screen_size.0,
            screen_size.1,
            swapchain.images.len(),
            params.generation
        );

        Ok(Self {
            frame,
            swapchain,
            device,
            _surface: surface,
            _instance: instance,
            window,
            properties: DeviceProperties {
                backend: BackendKind::Vulkan,
                generation: params.generation,
                screen_size,
                full_screen: params.full_screen(),
                multisampling: 1,
                vertical_sync: params.vertical_sync(),
                opengl_context: false,
            },
            state: RenderState::default(),
            resources: ResourceTable::new(params.generation),
        })
    }

    /// The window this device presents to
    pub fn window(&self) -> &NativeWindow {
        &self.window
    }

    /// Mutable window, for event polling
    pub fn window_mut(&mut self) -> &mut NativeWindow {
        &mut self.window
    }

    fn record_clear(&self, image: vk::Image) -> Result<(), vk::Result> {
        let device = &self.device.device;
        let cmd = self.frame.command_buffer;
        let range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        let to_transfer = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range)
            .build();
        let to_present = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ)
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range)
            .build();
        let clear = vk::ClearColorValue {
            float32: self.state.clear_color.to_array(),
        };

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            let begin = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin)?;
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );
            device.cmd_clear_color_image(cmd, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &clear, &[range]);
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_present],
            );
            device.end_command_buffer(cmd)
        }
    }

    fn present_frame(&mut self) -> Result<(), vk::Result> {
        let device = self.device.device.clone();
        let fences = [self.frame.in_flight];

        unsafe { device.wait_for_fences(&fences, true, u64::MAX)? };
        let (index, _suboptimal) = unsafe {
            self.swapchain.loader.acquire_next_image(
                self.swapchain.swapchain,
                u64::MAX,
                self.frame.image_available,
                vk::Fence::null(),
            )?
        };
        let image = self.swapchain.images[index as usize];
        self.record_clear(image)?;

        let wait_semaphores = [self.frame.image_available];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let command_buffers = [self.frame.command_buffer];
        let signal_semaphores = [self.frame.render_finished];
        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let swapchains = [self.swapchain.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe {
            device.reset_fences(&fences)?;
            device.queue_submit(self.device.graphics_queue, &[submit], self.frame.in_flight)?;
            self.swapchain
                .loader
                .queue_present(self.device.present_queue, &present_info)?;
        }
        Ok(())
    }
}

impl Device for VulkanDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn render_state(&self) -> &RenderState {
        &self.state
    }

    fn render_state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.present_frame()
            .map_err(|e| DeviceError::Present(format!("{:?}", e)))?;
        self.window.poll_events();
        Ok(())
    }

    fn set_caption(&mut self, title: &str, taskmsg: &str) -> DeviceResult<()> {
        self.window.set_caption(title, taskmsg);
        Ok(())
    }

    fn set_icon(&mut self, icon: &WindowIcon) -> DeviceResult<()> {
        self.window.set_icon(icon);
        Ok(())
    }

    fn create_resource(&mut self, desc: ResourceDesc) -> DeviceResult<GpuHandle> {
        Ok(self.resources.insert(desc))
    }

    fn destroy_resource(&mut self, handle: GpuHandle) -> bool {
        self.resources.remove(handle).is_some()
    }

    fn resources(&self) -> &ResourceTable {
        &self.resources
    }
}
