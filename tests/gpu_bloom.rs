//! GPU integration tests.
//!
//! These need a wgpu adapter (a software one such as llvmpipe or WARP is
//! enough). On machines without one every test returns early.

use std::sync::Arc;

use glowpass::cli::{run_batch, run_job, BatchOutcome};
use glowpass::effects::pass_filter::LUMINANCE_WEIGHTS;
use glowpass::effects::{Bloom, GaussianBlur, PassFilter, PassFilterType};
use glowpass::gpu::{
    readback, states, Fbo, FullScreenPass, GpuContext, PassBindings, PassOptions, RenderContext, Texture,
    SHADER_RESOURCE_RENDER_TARGET,
};
use glowpass::job::{BatchJobSpec, BloomJobSpec};
use glowpass::{BloomSettings, EffectPhase};

fn gpu() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::headless()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn frame(gpu: &GpuContext, width: u32, height: u32, pixels: &[u8]) -> Arc<Texture> {
    frame_with_format(gpu, width, height, wgpu::TextureFormat::Rgba8Unorm, pixels)
}

fn frame_with_format(
    gpu: &GpuContext,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    pixels: &[u8],
) -> Arc<Texture> {
    Arc::new(
        Texture::from_rgba8(
            gpu,
            "Test Frame",
            width,
            height,
            format,
            SHADER_RESOURCE_RENDER_TARGET | wgpu::TextureUsages::COPY_SRC,
            pixels,
        )
        .unwrap(),
    )
}

/// Runs a filter over a solid image and returns the resulting center texel.
fn filter_solid(gpu: &GpuContext, filter: &mut PassFilter, rgba: [u8; 4]) -> [u8; 4] {
    let src = frame(gpu, 4, 4, &solid(4, 4, rgba));
    let copy = frame(gpu, 4, 4, &solid(4, 4, [1, 2, 3, 4]));
    let mut ctx = RenderContext::new(gpu, "test");
    let filtered = filter.execute(&mut ctx, &src).unwrap();
    ctx.blit(&filtered, &copy).unwrap();
    ctx.submit();
    pixel(&readback::read_rgba8(gpu, &copy).unwrap(), 4, 2, 2)
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("glowpass-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    rgba.iter().copied().cycle().take((width * height * 4) as usize).collect()
}

fn pixel(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

fn run_bloom(gpu: &GpuContext, bloom: &mut Bloom, target: &Arc<Texture>) -> Vec<u8> {
    let fbo = Fbo::with_color(Arc::clone(target)).unwrap();
    let mut ctx = RenderContext::new(gpu, "test");
    bloom.execute(&mut ctx, &fbo).unwrap();
    ctx.submit();
    readback::read_rgba8(gpu, target).unwrap()
}

#[test]
fn test_black_frame_stays_black() {
    let Some(gpu) = gpu() else { return };
    let target = frame(&gpu, 32, 32, &solid(32, 32, [0, 0, 0, 255]));
    let mut bloom = Bloom::new(&gpu, 0.5, 5, 2.0);

    let out = run_bloom(&gpu, &mut bloom, &target);
    assert!(out.chunks(4).all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
}

#[test]
fn test_bright_square_glows_outward() {
    let Some(gpu) = gpu() else { return };
    let (w, h) = (64u32, 64u32);
    let mut pixels = solid(w, h, [0, 0, 0, 255]);
    for y in 28..36 {
        for x in 28..36 {
            let i = ((y * w + x) * 4) as usize;
            pixels[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
        }
    }
    let target = frame(&gpu, w, h, &pixels);
    let mut bloom = Bloom::new(&gpu, 0.5, 15, 4.0);

    let out = run_bloom(&gpu, &mut bloom, &target);

    assert_eq!(pixel(&out, w, 32, 32)[..3], [255, 255, 255]);
    let halo = pixel(&out, w, 36, 32);
    assert!(halo[0] > 0, "no glow next to the square: {:?}", halo);
    assert_eq!(pixel(&out, w, 0, 0)[..3], [0, 0, 0]);
    assert_eq!(pixel(&out, w, 63, 63)[..3], [0, 0, 0]);
}

#[test]
fn test_low_res_texture_reused_until_size_changes() {
    let Some(gpu) = gpu() else { return };
    let mut bloom = Bloom::new(&gpu, 0.8, 5, 2.0);

    let a = frame(&gpu, 320, 240, &solid(320, 240, [10, 10, 10, 255]));
    run_bloom(&gpu, &mut bloom, &a);
    let first = Arc::clone(bloom.low_res_texture().unwrap());
    assert_eq!((first.width(), first.height()), (341, 256));
    assert_eq!(first.usage(), SHADER_RESOURCE_RENDER_TARGET);

    run_bloom(&gpu, &mut bloom, &a);
    assert!(Arc::ptr_eq(&first, bloom.low_res_texture().unwrap()));

    let b = frame(&gpu, 1600, 1200, &solid(1600, 1200, [10, 10, 10, 255]));
    run_bloom(&gpu, &mut bloom, &b);
    let second = bloom.low_res_texture().unwrap();
    assert!(!Arc::ptr_eq(&first, second));
    assert_eq!((second.width(), second.height()), (400, 300));
}

#[test]
fn test_missing_color_target_is_an_error() {
    let Some(gpu) = gpu() else { return };
    let mut bloom = Bloom::new(&gpu, 0.8, 5, 2.0);
    let mut ctx = RenderContext::new(&gpu, "test");

    let err = bloom.execute(&mut ctx, &Fbo::new()).unwrap_err();
    assert_eq!(err.phase, EffectPhase::Composite);
    assert!(bloom.low_res_texture().is_none());
}

#[test]
fn test_settings_round_trip() {
    let Some(gpu) = gpu() else { return };
    let mut bloom = Bloom::new(&gpu, 0.8, 5, 2.0);
    bloom.apply_settings(&BloomSettings {
        threshold: 0.3,
        kernel_width: 10,
        sigma: 3.0,
    });
    let settings = bloom.settings();
    assert_eq!(settings.threshold, 0.3);
    assert_eq!(settings.kernel_width, 11);
    assert_eq!(settings.sigma, 3.0);
    assert_eq!(bloom.blur().weights().len(), 6);
}

#[test]
fn test_render_ui_applies_edits() {
    let Some(gpu) = gpu() else { return };
    let mut bloom = Bloom::new(&gpu, 0.8, 5, 2.0);
    let mut ui = glowpass::ui::ScriptedUi::new().with_float("Threshold", 0.1).with_int("Kernel Width", 7);

    bloom.render_ui(&mut ui, Some("Bloom"));
    assert_eq!(bloom.threshold(), 0.1);
    assert_eq!(bloom.blur().kernel_width(), 7);
    assert_eq!(ui.groups_ended, 1);
}

#[test]
fn test_high_pass_rejects_dim_texels() {
    let Some(gpu) = gpu() else { return };
    let (w, h) = (16u32, 4u32);
    let mut pixels = solid(w, h, [64, 64, 64, 255]);
    for y in 0..h {
        for x in 0..w / 2 {
            let i = ((y * w + x) * 4) as usize;
            pixels[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
        }
    }
    let src = frame(&gpu, w, h, &pixels);
    let copy = frame(&gpu, w, h, &solid(w, h, [1, 2, 3, 4]));
    let mut filter = PassFilter::new(&gpu, PassFilterType::HighPass, 0.5);

    let mut ctx = RenderContext::new(&gpu, "test");
    let filtered = filter.execute(&mut ctx, &src).unwrap();
    ctx.blit(&filtered, &copy).unwrap();
    ctx.submit();

    let out = readback::read_rgba8(&gpu, &copy).unwrap();
    assert_eq!(pixel(&out, w, 1, 1), [255, 255, 255, 255]);
    assert_eq!(pixel(&out, w, 14, 1), [0, 0, 0, 0]);
}

#[test]
fn test_blur_preserves_uniform_image() {
    let Some(gpu) = gpu() else { return };
    let (w, h) = (24u32, 24u32);
    let src = frame(&gpu, w, h, &solid(w, h, [128, 128, 128, 255]));
    let dst = frame(&gpu, w, h, &solid(w, h, [0, 0, 0, 0]));
    let fbo = Fbo::with_color(Arc::clone(&dst)).unwrap();
    let mut blur = GaussianBlur::new(&gpu, 9, 3.0);

    let mut ctx = RenderContext::new(&gpu, "test");
    blur.execute(&mut ctx, &src, &fbo).unwrap();
    ctx.submit();

    let out = readback::read_rgba8(&gpu, &dst).unwrap();
    for p in out.chunks(4) {
        assert!((p[0] as i32 - 128).abs() <= 1, "{:?}", p);
        assert!((p[3] as i32 - 255).abs() <= 1, "{:?}", p);
    }
}

#[test]
fn test_run_job_writes_image_and_metadata() {
    let Some(gpu) = gpu() else { return };
    let dir = temp_dir("job");
    let input = dir.join("in.png");
    image::save_buffer(&input, &solid(40, 30, [200, 200, 200, 255]), 40, 30, image::ColorType::Rgba8).unwrap();

    let mut job = BloomJobSpec::new(input, dir.join("out/out.png"));
    job.write_metadata = true;
    let mut bloom = Bloom::from_settings(&gpu, &job.settings);

    let outcome = run_job(&gpu, &mut bloom, &job).unwrap();
    assert_eq!((outcome.width, outcome.height), (40, 30));
    assert_eq!((outcome.low_res_width, outcome.low_res_height), (341, 256));

    let written = image::open(&job.output_path).unwrap().to_rgba8();
    assert_eq!(written.dimensions(), (40, 30));
    let metadata_path = outcome.metadata_path.unwrap();
    let metadata: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(metadata_path).unwrap()).unwrap();
    assert_eq!(metadata["width"], 40);
    assert_eq!(metadata["inputHash"].as_str().map(str::len), Some(64));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_low_res_texture_recreated_on_format_change() {
    let Some(gpu) = gpu() else { return };
    let mut bloom = Bloom::new(&gpu, 0.8, 5, 2.0);
    let pixels = solid(320, 240, [10, 10, 10, 255]);

    let unorm = frame_with_format(&gpu, 320, 240, wgpu::TextureFormat::Rgba8Unorm, &pixels);
    run_bloom(&gpu, &mut bloom, &unorm);
    let first = Arc::clone(bloom.low_res_texture().unwrap());
    assert_eq!(first.format(), wgpu::TextureFormat::Rgba8Unorm);

    let srgb = frame_with_format(&gpu, 320, 240, wgpu::TextureFormat::Rgba8UnormSrgb, &pixels);
    run_bloom(&gpu, &mut bloom, &srgb);
    let second = bloom.low_res_texture().unwrap();
    assert!(!Arc::ptr_eq(&first, second));
    assert_eq!(second.format(), wgpu::TextureFormat::Rgba8UnormSrgb);
    assert_eq!((second.width(), second.height()), (341, 256));
}

#[test]
fn test_blooms_recorded_together_keep_their_own_threshold() {
    let Some(gpu) = gpu() else { return };
    let grey = solid(64, 64, [128, 128, 128, 255]);
    let a = frame(&gpu, 64, 64, &grey);
    let b = frame(&gpu, 64, 64, &grey);
    let fbo_a = Fbo::with_color(Arc::clone(&a)).unwrap();
    let fbo_b = Fbo::with_color(Arc::clone(&b)).unwrap();
    let mut bloom = Bloom::new(&gpu, 0.9, 5, 2.0);

    let mut ctx = RenderContext::new(&gpu, "test");
    bloom.execute(&mut ctx, &fbo_a).unwrap();
    bloom.apply_settings(&BloomSettings {
        threshold: 0.1,
        ..bloom.settings()
    });
    bloom.execute(&mut ctx, &fbo_b).unwrap();
    ctx.submit();

    let out_a = readback::read_rgba8(&gpu, &a).unwrap();
    let out_b = readback::read_rgba8(&gpu, &b).unwrap();
    assert_eq!(pixel(&out_a, 64, 32, 32)[..3], [128, 128, 128]);
    assert!(pixel(&out_b, 64, 32, 32)[0] > 200, "{:?}", pixel(&out_b, 64, 32, 32));
}

#[test]
fn test_filter_results_recorded_together_stay_independent() {
    let Some(gpu) = gpu() else { return };
    let src = frame(&gpu, 8, 8, &solid(8, 8, [128, 128, 128, 255]));
    let strict = frame(&gpu, 8, 8, &solid(8, 8, [1, 2, 3, 4]));
    let loose = frame(&gpu, 8, 8, &solid(8, 8, [1, 2, 3, 4]));
    let mut filter = PassFilter::new(&gpu, PassFilterType::HighPass, 0.9);

    let mut ctx = RenderContext::new(&gpu, "test");
    let filtered = filter.execute(&mut ctx, &src).unwrap();
    ctx.blit(&filtered, &strict).unwrap();
    filter.set_threshold(0.1);
    let filtered = filter.execute(&mut ctx, &src).unwrap();
    ctx.blit(&filtered, &loose).unwrap();
    ctx.submit();

    assert_eq!(pixel(&readback::read_rgba8(&gpu, &strict).unwrap(), 8, 4, 4), [0, 0, 0, 0]);
    assert_eq!(pixel(&readback::read_rgba8(&gpu, &loose).unwrap(), 8, 4, 4), [128, 128, 128, 255]);
}

#[test]
fn test_threshold_equality_goes_to_low_pass_on_gpu() {
    let Some(gpu) = gpu() else { return };
    // Pure red has luminance exactly equal to the red weight.
    let threshold = LUMINANCE_WEIGHTS[0];
    let mut high = PassFilter::new(&gpu, PassFilterType::HighPass, threshold);
    let mut low = PassFilter::new(&gpu, PassFilterType::LowPass, threshold);
    assert_eq!(high.filter_type(), PassFilterType::HighPass);
    assert_eq!(low.filter_type(), PassFilterType::LowPass);

    let red = [255, 0, 0, 255];
    assert_eq!(filter_solid(&gpu, &mut high, red), [0, 0, 0, 0]);
    assert_eq!(filter_solid(&gpu, &mut low, red), red);

    let green = [0, 255, 0, 255];
    assert_eq!(filter_solid(&gpu, &mut high, green), green);
    assert_eq!(filter_solid(&gpu, &mut low, green), [0, 0, 0, 0]);
}

#[test]
fn test_pipelines_cached_per_format_and_blend() {
    let Some(gpu) = gpu() else { return };
    let device = gpu.device();
    let pass = FullScreenPass::new(device, "Cache Test", include_str!("../src/gpu/shaders/blit.wgsl"));
    let sampler = states::linear_clamp_sampler(device, "Cache Test Sampler");
    let uniforms = pass.uniform_bind_group(device, "SrcRect", &[0.0f32, 0.0, 1.0, 1.0]);
    let src = frame(&gpu, 4, 4, &solid(4, 4, [0, 0, 0, 255]));
    let unorm = frame(&gpu, 4, 4, &solid(4, 4, [0, 0, 0, 255]));
    let srgb = frame_with_format(&gpu, 4, 4, wgpu::TextureFormat::Rgba8UnormSrgb, &solid(4, 4, [0, 0, 0, 255]));
    let bindings = PassBindings {
        source: &src,
        sampler: &sampler,
        uniforms: &uniforms,
    };

    let mut ctx = RenderContext::new(&gpu, "test");
    let overwrite = PassOptions::overwrite(EffectPhase::Blit);
    pass.execute(device, ctx.encoder_mut(), &unorm, &bindings, overwrite).unwrap();
    pass.execute(device, ctx.encoder_mut(), &unorm, &bindings, overwrite).unwrap();
    assert_eq!(pass.pipeline_count(), 1);

    let additive = PassOptions::blend_over(states::additive_blend(), EffectPhase::Composite);
    pass.execute(device, ctx.encoder_mut(), &unorm, &bindings, additive).unwrap();
    assert_eq!(pass.pipeline_count(), 2);

    pass.execute(device, ctx.encoder_mut(), &srgb, &bindings, overwrite).unwrap();
    pass.execute(device, ctx.encoder_mut(), &unorm, &bindings, additive).unwrap();
    assert_eq!(pass.pipeline_count(), 3);
    ctx.submit();
}

#[test]
fn test_batch_continues_past_missing_input() {
    let Some(gpu) = gpu() else { return };
    let dir = temp_dir("batch");
    let input = dir.join("in.png");
    image::save_buffer(&input, &solid(16, 16, [50, 50, 50, 255]), 16, 16, image::ColorType::Rgba8).unwrap();

    let mut batch = BatchJobSpec {
        batch_id: "mixed".to_string(),
        jobs: vec![
            BloomJobSpec::new(dir.join("missing.png"), dir.join("missing_out.png")),
            BloomJobSpec::new(input, dir.join("out.png")),
        ],
        continue_on_error: true,
    };

    let outcome = run_batch(&gpu, &batch).unwrap();
    assert_eq!(outcome, BatchOutcome { succeeded: 1, failed: 1 });
    assert!(dir.join("out.png").exists());

    batch.continue_on_error = false;
    let err = run_batch(&gpu, &batch).unwrap_err();
    assert_eq!(err.phase, EffectPhase::JobConfig);

    std::fs::remove_dir_all(dir).ok();
}
