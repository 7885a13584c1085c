use anyhow::{Context, Result};
use log::*;
use renderer::Renderer;
use std::time::Instant;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

pub mod audio;
pub mod input;
mod renderer;
pub mod scene;
mod vulkan;

pub use audio::{SoundBank, SoundSink};
pub use input::Input;
pub use scene::ModelUniform;
pub use vulkan::RenderError;
pub use winit::keyboard::KeyCode;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// How many quads are drawn each frame.
    pub object_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            title: "Pong Engine".to_string(),
            width: 640,
            height: 480,
            object_count: 1,
        }
    }
}

/// What the engine drives once per frame.
pub trait Game {
    fn update(&mut self, delta: f32, input: &Input, sounds: &mut dyn SoundSink);

    /// One model matrix per drawn object, in draw order.
    fn models(&self) -> Vec<ModelUniform>;

    /// Called with the drawable size at startup and whenever it changes.
    fn resize(&mut self, width: u32, height: u32);
}

pub struct Engine {
    window: Window,
    renderer: Renderer,
    event_loop: EventLoop<()>,
    input: Input,
    sounds: SoundBank,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Engine> {
        // Window
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)?;

        let renderer = unsafe { Renderer::create(&window, &config.title, config.object_count) }
            .context("Failed to create renderer")?;

        Ok(Engine {
            window,
            renderer,
            event_loop,
            input: Input::new(),
            sounds: SoundBank::new(),
        })
    }

    /// The drawable size in pixels, which may differ from the requested one.
    pub fn extent(&self) -> (u32, u32) {
        self.renderer.extent()
    }

    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }

    pub fn sounds_mut(&mut self) -> &mut SoundBank {
        &mut self.sounds
    }

    /// Runs until the window is closed or rendering fails.
    pub fn run(self, game: &mut impl Game) -> Result<()> {
        let Engine {
            window,
            mut renderer,
            event_loop,
            mut input,
            mut sounds,
        } = self;

        let (width, height) = renderer.extent();
        game.resize(width, height);

        let mut last_frame = Instant::now();
        let mut failure = None;

        event_loop.run(|event, elwt| match event {
            // Request a redraw when all events were processed.
            Event::AboutToWait => window.request_redraw(),
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::RedrawRequested if !elwt.exiting() => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    game.update(delta, &input, &mut sounds);
                    renderer.set_models(&game.models());

                    match unsafe { renderer.render(&window) } {
                        Ok(Some((width, height))) => game.resize(width, height),
                        Ok(None) => {}
                        Err(error) => {
                            error!("Rendering failed: {}", error);
                            failure = Some(error);
                            elwt.exit();
                        }
                    }
                }
                WindowEvent::Resized(_) => renderer.request_resize(),
                WindowEvent::KeyboardInput { event, .. } => input.handle_key(&event),
                WindowEvent::CloseRequested => {
                    info!("Window closed.");
                    elwt.exit();
                }
                _ => {}
            },
            _ => {}
        })?;

        // GPU objects go before the window their surface belongs to.
        drop(renderer);
        drop(window);

        match failure {
            Some(error) => Err(error).context("Failed to render frame"),
            None => Ok(()),
        }
    }
}
