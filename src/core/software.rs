use crate::core::device::{
    Attachment, BufferId, Device, DrawCommand, Filter, FramebufferId, Primitive, ProgramId,
    TextureDesc, TextureFormat, TextureId, TextureKind, Wrap,
};
use crate::core::program::{
    AttributeBinding, Defines, ProgramDesc, ShaderContext, ShaderInterface, ShaderKernel,
    UniformValue,
};
use crate::core::rasterizer::{ClipVertex, Rasterizer, RenderTarget};
use crate::core::sampler::{Texels, TextureArena, TextureStore, pack};
use log::{info, trace, warn};
use nalgebra::Vector4;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
struct FramebufferStore {
    color: Option<Attachment>,
    depth: Option<Attachment>,
}

struct ProgramStore {
    name: String,
    kernel: Arc<dyn ShaderKernel>,
    interface: ShaderInterface,
    defines: Defines,
    uniforms: Vec<Option<UniformValue>>,
    attributes: Vec<Option<AttributeBinding>>,
    index_buffer: Option<BufferId>,
}

/// A CPU implementation of [`Device`] following OpenGL conventions: bottom-left
/// window origin, counter-clockwise front faces, depth in [0, 1].
pub struct SoftwareDevice {
    buffers: Vec<Vec<u8>>,
    textures: TextureArena,
    framebuffers: Vec<FramebufferStore>,
    programs: Vec<ProgramStore>,
}

#[inline]
fn slot(id: u32) -> Option<usize> {
    (id as usize).checked_sub(1)
}

impl SoftwareDevice {
    /// Creates the device with a default framebuffer of `width` x `height`.
    pub fn new(width: usize, height: usize) -> Self {
        let mut textures = TextureArena::default();
        let color = textures.insert(TextureStore::new(TextureDesc {
            kind: TextureKind::Flat,
            format: TextureFormat::Rgba8,
            filter: Filter::Nearest,
            wrap: Wrap::EdgeClamp,
            width,
            height,
        }));
        let depth = textures.insert(TextureStore::new(TextureDesc {
            kind: TextureKind::Flat,
            format: TextureFormat::Depth16,
            filter: Filter::Nearest,
            wrap: Wrap::EdgeClamp,
            width,
            height,
        }));
        info!("Software device with {}x{} default framebuffer", width, height);

        Self {
            buffers: Vec::new(),
            textures,
            framebuffers: vec![FramebufferStore {
                color: Some(Attachment::Texture(color)),
                depth: Some(Attachment::Texture(depth)),
            }],
            programs: Vec::new(),
        }
    }

    fn buffer(&self, id: BufferId) -> Option<&Vec<u8>> {
        slot(id.0).and_then(|i| self.buffers.get(i))
    }

    fn framebuffer(&self, id: FramebufferId) -> Option<FramebufferStore> {
        self.framebuffers.get(id.0 as usize).copied()
    }

    fn program_mut(&mut self, id: ProgramId) -> Option<&mut ProgramStore> {
        slot(id.0).and_then(|i| self.programs.get_mut(i))
    }

    fn attachment_desc(&self, attachment: Attachment) -> Option<TextureDesc> {
        let store = self.textures.get(attachment.texture())?;
        (attachment.layer() < store.layers.len()).then_some(store.desc)
    }

    /// Size of a complete framebuffer's attachments.
    fn target_size(&self, id: FramebufferId) -> Option<(usize, usize)> {
        let fb = self.framebuffer(id)?;
        let color = match fb.color {
            Some(a) => Some(self.attachment_desc(a).filter(|d| d.format == TextureFormat::Rgba8)?),
            None => None,
        };
        let depth = match fb.depth {
            Some(a) => Some(self.attachment_desc(a).filter(|d| d.format == TextureFormat::Depth16)?),
            None => None,
        };
        match (color, depth) {
            (Some(c), Some(d)) if (c.width, c.height) != (d.width, d.height) => None,
            (Some(c), _) => Some((c.width, c.height)),
            (None, Some(d)) => Some((d.width, d.height)),
            (None, None) => None,
        }
    }

    fn fill_layer(&mut self, attachment: Option<Attachment>, fill: impl Fn(&mut Texels)) {
        let Some(attachment) = attachment else {
            return;
        };
        if let Some(layer) = self
            .textures
            .get_mut(attachment.texture())
            .and_then(|t| t.layers.get_mut(attachment.layer()))
        {
            fill(layer);
        }
    }
}

/// Moves an attachment layer out of the arena for writing. Textures the program
/// also samples keep a snapshot of their pre-draw contents.
fn take_layer(textures: &mut TextureArena, attachment: Attachment, sampled: &[TextureId]) -> Option<Texels> {
    let layer = textures
        .get_mut(attachment.texture())?
        .layers
        .get_mut(attachment.layer())?;
    let empty = layer.empty_like();
    let data = std::mem::replace(layer, empty);
    if sampled.contains(&attachment.texture()) {
        *layer = data.clone();
    }
    Some(data)
}

fn restore_layer(textures: &mut TextureArena, attachment: Attachment, data: Texels) {
    if let Some(layer) = textures
        .get_mut(attachment.texture())
        .and_then(|t| t.layers.get_mut(attachment.layer()))
    {
        *layer = data;
    }
}

/// Reads the vertex inputs of one vertex. Unbound inputs read (0, 0, 0, 1).
fn fetch_inputs(
    buffers: &[Vec<u8>],
    attributes: &[Option<AttributeBinding>],
    index: usize,
    out: &mut [Vector4<f32>],
) {
    for (location, value) in out.iter_mut().enumerate() {
        *value = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let Some(binding) = attributes.get(location).copied().flatten() else {
            continue;
        };
        let data = slot(binding.buffer.0)
            .and_then(|i| buffers.get(i))
            .map_or(&[][..], Vec::as_slice);
        let base = binding.offset + index * binding.stride;
        for c in 0..binding.components.min(4) {
            let at = base + c * 4;
            let bytes = data.get(at..at + 4).unwrap_or_else(|| {
                panic!(
                    "vertex {} input {} reads past the end of buffer {:?} ({} bytes)",
                    index,
                    location,
                    binding.buffer,
                    data.len()
                )
            });
            value[c] = bytemuck::pod_read_unaligned(bytes);
        }
    }
}

impl Device for SoftwareDevice {
    fn name(&self) -> &str {
        "software"
    }

    fn create_buffer(&mut self) -> BufferId {
        self.buffers.push(Vec::new());
        BufferId(self.buffers.len() as u32)
    }

    fn allocate_buffer(&mut self, buffer: BufferId, size: usize) {
        if let Some(data) = slot(buffer.0).and_then(|i| self.buffers.get_mut(i)) {
            *data = vec![0; size];
        }
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        let Some(data) = slot(buffer.0).and_then(|i| self.buffers.get_mut(i)) else {
            return;
        };
        assert!(
            offset + bytes.len() <= data.len(),
            "write of {} bytes at {} overruns buffer {:?} ({} bytes)",
            bytes.len(),
            offset,
            buffer,
            data.len()
        );
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn read_buffer(&self, buffer: BufferId) -> Vec<u8> {
        self.buffer(buffer).cloned().unwrap_or_default()
    }

    fn create_texture(&mut self, desc: TextureDesc) -> TextureId {
        self.textures.insert(TextureStore::new(desc))
    }

    fn set_border_color(&mut self, texture: TextureId, rgba: [f32; 4]) {
        if let Some(store) = self.textures.get_mut(texture) {
            store.border = rgba;
        }
    }

    fn upload_texture(&mut self, texture: TextureId, layer: usize, rgba: &[u8]) {
        let Some(store) = self.textures.get_mut(texture) else {
            return;
        };
        let expected = store.desc.width * store.desc.height * 4;
        assert_eq!(
            rgba.len(),
            expected,
            "texture {:?} upload has the wrong size",
            texture
        );
        let Some(dst) = store.layers.get_mut(layer) else {
            return;
        };
        *dst = match store.desc.format {
            TextureFormat::Rgba8 => Texels::Color(
                rgba.chunks_exact(4)
                    .map(|p| [p[0], p[1], p[2], p[3]])
                    .collect(),
            ),
            TextureFormat::Depth16 => {
                Texels::Depth(rgba.chunks_exact(4).map(|p| p[0] as f32 / 255.0).collect())
            }
        };
    }

    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(texture).map(|t| t.desc)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        self.framebuffers.push(FramebufferStore::default());
        FramebufferId((self.framebuffers.len() - 1) as u32)
    }

    fn attach_color(&mut self, framebuffer: FramebufferId, attachment: Option<Attachment>) {
        if let Some(fb) = self.framebuffers.get_mut(framebuffer.0 as usize) {
            fb.color = attachment;
        }
    }

    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: Option<Attachment>) {
        if let Some(fb) = self.framebuffers.get_mut(framebuffer.0 as usize) {
            fb.depth = attachment;
        }
    }

    fn framebuffer_complete(&self, framebuffer: FramebufferId) -> bool {
        self.target_size(framebuffer).is_some()
    }

    fn clear_color(&mut self, framebuffer: FramebufferId, rgba: [f32; 4]) {
        let Some(fb) = self.framebuffer(framebuffer) else {
            return;
        };
        let texel = pack(Vector4::from(rgba));
        self.fill_layer(fb.color, |layer| {
            if let Texels::Color(c) = layer {
                c.fill(texel);
            }
        });
    }

    fn clear_depth(&mut self, framebuffer: FramebufferId, depth: f32) {
        let Some(fb) = self.framebuffer(framebuffer) else {
            return;
        };
        self.fill_layer(fb.depth, |layer| {
            if let Texels::Depth(d) = layer {
                d.fill(depth);
            }
        });
    }

    fn read_pixels(&self, framebuffer: FramebufferId) -> Option<(usize, usize, Vec<u8>)> {
        let attachment = self.framebuffer(framebuffer)?.color?;
        let store = self.textures.get(attachment.texture())?;
        match store.layers.get(attachment.layer())? {
            Texels::Color(c) => Some((
                store.desc.width,
                store.desc.height,
                bytemuck::cast_slice::<[u8; 4], u8>(c).to_vec(),
            )),
            Texels::Depth(_) => None,
        }
    }

    fn read_depth(&self, framebuffer: FramebufferId) -> Option<(usize, usize, Vec<f32>)> {
        let attachment = self.framebuffer(framebuffer)?.depth?;
        let store = self.textures.get(attachment.texture())?;
        match store.layers.get(attachment.layer())? {
            Texels::Depth(d) => Some((store.desc.width, store.desc.height, d.clone())),
            Texels::Color(_) => None,
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, String> {
        let interface = desc.kernel.interface();
        let mut log = Vec::new();

        for flag in desc.defines.iter() {
            if !interface.defines.contains(&flag) {
                log.push(format!("0:1(1): error: unknown preprocessor flag `{}`", flag));
            }
        }
        if desc.geometry_stage && !interface.geometry_stage {
            log.push("error: no geometry stage in kernel".to_string());
        }
        if interface.inputs.is_empty() {
            log.push("error: vertex stage declares no inputs".to_string());
        }
        let mut seen = HashSet::new();
        let names = interface
            .inputs
            .iter()
            .chain(interface.uniforms.iter().map(|(n, _)| n));
        for name in names {
            if !seen.insert(*name) {
                log.push(format!("error: `{}` redeclared", name));
            }
        }

        if !log.is_empty() {
            return Err(format!(
                "program '{}' failed to link:\n{}",
                desc.name,
                log.join("\n")
            ));
        }

        self.programs.push(ProgramStore {
            name: desc.name.clone(),
            kernel: Arc::clone(&desc.kernel),
            interface,
            defines: desc.defines.clone(),
            uniforms: vec![None; interface.uniforms.len()],
            attributes: vec![None; interface.inputs.len()],
            index_buffer: None,
        });
        Ok(ProgramId(self.programs.len() as u32))
    }

    fn set_uniform(&mut self, program: ProgramId, location: usize, value: UniformValue) {
        if let Some(slot) = self
            .program_mut(program)
            .and_then(|p| p.uniforms.get_mut(location))
        {
            *slot = Some(value);
        }
    }

    fn bind_attribute(&mut self, program: ProgramId, location: usize, binding: AttributeBinding) {
        if let Some(slot) = self
            .program_mut(program)
            .and_then(|p| p.attributes.get_mut(location))
        {
            *slot = Some(binding);
        }
    }

    fn bind_index_buffer(&mut self, program: ProgramId, buffer: Option<BufferId>) {
        if let Some(p) = self.program_mut(program) {
            p.index_buffer = buffer;
        }
    }

    fn draw(&mut self, command: &DrawCommand) {
        let Some((width, height)) = self.target_size(command.framebuffer) else {
            warn!(
                "Draw into incomplete framebuffer {:?} skipped",
                command.framebuffer
            );
            return;
        };
        let Some(fb) = self.framebuffer(command.framebuffer) else {
            return;
        };
        let Some(program) = slot(command.program.0).and_then(|i| self.programs.get(i)) else {
            warn!("Draw with unknown program {:?} skipped", command.program);
            return;
        };
        trace!(
            "draw '{}' {:?} x{} into {:?}",
            program.name, command.primitive, command.count, command.framebuffer
        );

        let indices: Vec<u32> = if command.indexed {
            let data = program
                .index_buffer
                .and_then(|b| slot(b.0))
                .and_then(|i| self.buffers.get(i))
                .map_or(&[][..], Vec::as_slice);
            assert!(
                command.count * 4 <= data.len(),
                "draw of {} indices overruns the index buffer ({} bytes)",
                command.count,
                data.len()
            );
            data[..command.count * 4]
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<u32>)
                .collect()
        } else {
            (0..command.count as u32).collect()
        };

        let sampled: Vec<TextureId> = program
            .uniforms
            .iter()
            .flatten()
            .filter_map(UniformValue::texture)
            .collect();
        let mut color = fb
            .color
            .and_then(|a| take_layer(&mut self.textures, a, &sampled));
        let mut depth = fb
            .depth
            .and_then(|a| take_layer(&mut self.textures, a, &sampled));

        {
            let ctx = ShaderContext::new(&program.uniforms, &self.textures, &program.defines);

            let vertex_count = indices.iter().max().map_or(0, |&m| m as usize + 1);
            let mut cache: Vec<Option<ClipVertex>> = vec![None; vertex_count];
            let mut inputs = vec![Vector4::new(0.0, 0.0, 0.0, 1.0); program.interface.inputs.len()];
            let mut shaded: Vec<ClipVertex> = Vec::with_capacity(indices.len());
            for &index in &indices {
                let index = index as usize;
                let vertex = match cache[index] {
                    Some(v) => v,
                    None => {
                        fetch_inputs(&self.buffers, &program.attributes, index, &mut inputs);
                        let v = program.kernel.vertex(&ctx, &inputs);
                        cache[index] = Some(v);
                        v
                    }
                };
                shaded.push(vertex);
            }

            let raster = Rasterizer {
                cull_mode: command.cull,
                raster_mode: command.raster,
                depth_test: command.depth,
                blend: command.blend,
                viewport: command.viewport.unwrap_or((width, height)),
                kernel: program.kernel.as_ref(),
                ctx: &ctx,
                writes_depth: program.interface.writes_depth,
            };
            let mut target = RenderTarget {
                width,
                height,
                color: match color.as_mut() {
                    Some(Texels::Color(c)) => Some(c.as_mut_slice()),
                    _ => None,
                },
                depth: match depth.as_mut() {
                    Some(Texels::Depth(d)) => Some(d.as_mut_slice()),
                    _ => None,
                },
            };

            match command.primitive {
                Primitive::Triangles => {
                    for tri in shaded.chunks_exact(3) {
                        raster.draw_triangle(&mut target, [&tri[0], &tri[1], &tri[2]]);
                    }
                }
                Primitive::TriangleFan => {
                    for i in 1..shaded.len().saturating_sub(1) {
                        raster.draw_triangle(&mut target, [&shaded[0], &shaded[i], &shaded[i + 1]]);
                    }
                }
                Primitive::Lines => {
                    for seg in shaded.chunks_exact(2) {
                        raster.draw_line(&mut target, &seg[0], &seg[1]);
                    }
                }
            }
        }

        if let (Some(attachment), Some(data)) = (fb.color, color) {
            restore_layer(&mut self.textures, attachment, data);
        }
        if let (Some(attachment), Some(data)) = (fb.depth, depth) {
            restore_layer(&mut self.textures, attachment, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{BlendMode, CullMode, DepthTest, RasterMode};
    use crate::core::program::{FragCoord, FragmentOutput, ShaderInterface, UniformKind, Varyings};

    /// Passes positions through and paints a uniform colour.
    struct Solid;

    impl ShaderKernel for Solid {
        fn interface(&self) -> ShaderInterface {
            ShaderInterface {
                inputs: &["position"],
                uniforms: &[("color", UniformKind::Vec4)],
                outputs: &["color"],
                defines: &["UNUSED"],
                writes_depth: false,
                geometry_stage: false,
            }
        }

        fn vertex(&self, _: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
            (inputs[0], Varyings::default())
        }

        fn fragment(&self, ctx: &ShaderContext, _: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
            Some(FragmentOutput::color(ctx.vec4(0)))
        }
    }

    fn command(program: ProgramId, count: usize, depth: DepthTest) -> DrawCommand {
        DrawCommand {
            program,
            framebuffer: FramebufferId::DEFAULT,
            depth,
            blend: BlendMode::Off,
            cull: CullMode::Back,
            raster: RasterMode::Fill,
            viewport: None,
            primitive: Primitive::Triangles,
            count,
            indexed: false,
        }
    }

    fn upload_triangle(device: &mut SoftwareDevice, program: ProgramId, z: f32) {
        let positions: [f32; 9] = [-1.0, -1.0, z, 3.0, -1.0, z, -1.0, 3.0, z];
        let buffer = device.create_buffer();
        device.allocate_buffer(buffer, 36);
        device.write_buffer(buffer, 0, bytemuck::cast_slice(&positions));
        device.bind_attribute(
            program,
            0,
            AttributeBinding {
                buffer,
                components: 3,
                stride: 12,
                offset: 0,
            },
        );
    }

    #[test]
    fn unknown_define_fails_with_log() {
        let mut device = SoftwareDevice::new(4, 4);
        let desc = ProgramDesc::new("solid", Arc::new(Solid)).with_defines(["SHADOWS"]);
        let err = device.create_program(&desc).unwrap_err();
        assert!(err.contains("SHADOWS"));
        assert!(err.contains("'solid'"));
    }

    #[test]
    fn full_screen_triangle_fills_default_framebuffer() {
        let mut device = SoftwareDevice::new(4, 4);
        let program = device
            .create_program(&ProgramDesc::new("solid", Arc::new(Solid)))
            .unwrap();
        upload_triangle(&mut device, program, 0.0);
        device.set_uniform(program, 0, UniformValue::Vec4(Vector4::new(1.0, 0.0, 0.0, 1.0)));
        device.clear_depth(FramebufferId::DEFAULT, 1.0);
        device.draw(&command(program, 3, DepthTest::Less));

        let (w, h, pixels) = device.read_pixels(FramebufferId::DEFAULT).unwrap();
        assert_eq!((w, h), (4, 4));
        assert!(pixels.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
        let (_, _, depth) = device.read_depth(FramebufferId::DEFAULT).unwrap();
        assert!(depth.iter().all(|d| (d - 0.5).abs() < 1e-6));
    }

    #[test]
    fn equal_depth_pass_only_touches_matching_fragments() {
        let mut device = SoftwareDevice::new(4, 4);
        let program = device
            .create_program(&ProgramDesc::new("solid", Arc::new(Solid)))
            .unwrap();
        upload_triangle(&mut device, program, 0.0);
        device.clear_depth(FramebufferId::DEFAULT, 1.0);
        device.set_uniform(program, 0, UniformValue::Vec4(Vector4::new(0.2, 0.2, 0.2, 1.0)));
        device.draw(&command(program, 3, DepthTest::Less));

        let mut additive = command(program, 3, DepthTest::Equal);
        additive.blend = BlendMode::Additive;
        device.set_uniform(program, 0, UniformValue::Vec4(Vector4::new(0.2, 0.0, 0.0, 0.0)));
        device.draw(&additive);

        let (_, _, pixels) = device.read_pixels(FramebufferId::DEFAULT).unwrap();
        assert!(pixels.chunks_exact(4).all(|p| p[0] == 102 && p[1] == 51));
    }

    #[test]
    fn incomplete_framebuffer_is_reported() {
        let mut device = SoftwareDevice::new(4, 4);
        let fb = device.create_framebuffer();
        assert!(!device.framebuffer_complete(fb));
        let tex = device.create_texture(TextureDesc {
            kind: TextureKind::Flat,
            format: TextureFormat::Depth16,
            filter: Filter::Nearest,
            wrap: Wrap::EdgeClamp,
            width: 8,
            height: 8,
        });
        device.attach_color(fb, Some(Attachment::Texture(tex)));
        assert!(!device.framebuffer_complete(fb));
        device.attach_color(fb, None);
        device.attach_depth(fb, Some(Attachment::Texture(tex)));
        assert!(device.framebuffer_complete(fb));
    }
}
