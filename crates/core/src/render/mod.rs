use std::cell::RefCell;
use std::rc::Rc;

use crate::{FramePosition, Result};

/// The draw callback. Renders one frame for the given playhead snapshot onto
/// the render surface.
///
/// Implementations must be idempotent for a given position: drawing the same
/// position twice yields identical surface content.
pub trait Renderer {
    fn draw(&mut self, frame: FramePosition) -> Result<()>;
}

impl<F> Renderer for F
where
    F: FnMut(FramePosition) -> Result<()>,
{
    fn draw(&mut self, frame: FramePosition) -> Result<()> {
        self(frame)
    }
}

/// Surface content shared between a renderer and a capture stream.
pub type SharedFramebuffer = Rc<RefCell<Framebuffer>>;

/// Headless render target. Instead of pixels it keeps the position of the
/// last frame drawn onto it.
#[derive(Debug, Default, Clone)]
pub struct Framebuffer {
    content: Option<FramePosition>,
    draws: u64,
}

impl Framebuffer {
    pub fn shared() -> SharedFramebuffer {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn content(&self) -> Option<FramePosition> {
        self.content
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }
}

/// Renderer drawing into a [`Framebuffer`].
#[derive(Debug, Clone)]
pub struct MemoryRenderer {
    target: SharedFramebuffer,
}

impl MemoryRenderer {
    pub fn new(target: SharedFramebuffer) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &SharedFramebuffer {
        &self.target
    }
}

impl Renderer for MemoryRenderer {
    fn draw(&mut self, frame: FramePosition) -> Result<()> {
        let mut target = self.target.borrow_mut();
        target.content = Some(frame);
        target.draws += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_renderer_overwrites_surface_content() {
        let framebuffer = Framebuffer::shared();
        let mut renderer = MemoryRenderer::new(framebuffer.clone());

        renderer.draw(FramePosition { u: 0.25, t: None }).unwrap();
        renderer.draw(FramePosition { u: 0.5, t: Some(2.0) }).unwrap();

        let surface = framebuffer.borrow();
        assert_eq!(surface.content(), Some(FramePosition { u: 0.5, t: Some(2.0) }));
        assert_eq!(surface.draws(), 2);
    }

    #[test]
    fn closures_are_renderers() {
        let mut seen = Vec::new();
        {
            let mut renderer = |frame: FramePosition| -> Result<()> {
                seen.push(frame.u);
                Ok(())
            };
            renderer.draw(FramePosition { u: 0.75, t: None }).unwrap();
        }
        assert_eq!(seen, vec![0.75]);
    }
}
