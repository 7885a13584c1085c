use log::*;
use std::fs;
use std::mem::size_of;
use std::path::Path;
use std::rc::Rc;
use vulkanalia::bytecode::Bytecode;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::Handle;

use super::constants;
use super::error::{RenderError, RenderResult, VkResultExt};

/// Vertices are bare positions.
pub type Vertex = [f32; 3];

pub struct VulkanPipeline {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    device: Rc<Device>,
}

impl VulkanPipeline {
    pub unsafe fn new(
        device: &Rc<Device>,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<VulkanPipeline> {
        let mut pipeline = VulkanPipeline {
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            device: device.clone(),
        };

        let vert = read_shader(constants::VERTEX_SHADER_PATH)?;
        let frag = read_shader(constants::FRAGMENT_SHADER_PATH)?;

        let vertex_shader_module = create_shader_module(device, constants::VERTEX_SHADER_PATH, &vert)?;
        let fragment_shader_module =
            match create_shader_module(device, constants::FRAGMENT_SHADER_PATH, &frag) {
                Ok(module) => module,
                Err(error) => {
                    device.destroy_shader_module(vertex_shader_module, None);
                    return Err(error);
                }
            };

        let result = pipeline.build(
            render_pass,
            extent,
            set_layouts,
            vertex_shader_module,
            fragment_shader_module,
        );

        device.destroy_shader_module(vertex_shader_module, None);
        device.destroy_shader_module(fragment_shader_module, None);

        result?;
        debug!("Created graphics pipeline.");
        Ok(pipeline)
    }

    unsafe fn build(
        &mut self,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        set_layouts: &[vk::DescriptorSetLayout],
        vertex_shader_module: vk::ShaderModule,
        fragment_shader_module: vk::ShaderModule,
    ) -> RenderResult<()> {
        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader_module)
            .name(b"main\0");

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader_module)
            .name(b"main\0");

        // vertex input
        let binding_descriptions = &[vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)];
        let attribute_descriptions = &[vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)];
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(binding_descriptions)
            .vertex_attribute_descriptions(attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(extent);

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        // rasterizer
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        // multisampling
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        // color blending
        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false);

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        // layout
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        self.pipeline_layout = self
            .device
            .create_pipeline_layout(&layout_info, None)
            .creating("pipeline layout")?;

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(self.pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        self.pipeline = self
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
            .creating("graphics pipeline")?
            .0[0];

        Ok(())
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device
                .destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

fn read_shader(path: &str) -> RenderResult<Vec<u8>> {
    fs::read(path).map_err(|source| RenderError::ShaderLoad {
        path: path.into(),
        source,
    })
}

unsafe fn create_shader_module(
    device: &Device,
    path: impl AsRef<Path>,
    bytecode: &[u8],
) -> RenderResult<vk::ShaderModule> {
    let bytecode =
        Bytecode::new(bytecode).map_err(|_| RenderError::ShaderBytecode(path.as_ref().into()))?;
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.code_size())
        .code(bytecode.code());

    device
        .create_shader_module(&info, None)
        .creating("shader module")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_shader_names_its_path() {
        let error = read_shader("shaders/does-not-exist.spv").unwrap_err();
        assert!(matches!(error, RenderError::ShaderLoad { .. }));
        assert!(error.to_string().contains("shaders/does-not-exist.spv"));
    }

    #[test]
    fn vertex_stride_is_three_floats() {
        assert_eq!(size_of::<Vertex>(), 12);
    }
}
