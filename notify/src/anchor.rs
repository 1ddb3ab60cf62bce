use crate::{
    hints::{Hint, Hints},
    Result,
};

/// An on-screen element a notification points at.
pub trait Anchor {
    /// Center of the element in screen coordinates, or
    /// [`Error::NoWindow`](crate::Error::NoWindow) when it is not mapped.
    fn screen_center(&self) -> Result<(i32, i32)>;
}

impl<F> Anchor for F
where
    F: Fn() -> Result<(i32, i32)>,
{
    fn screen_center(&self) -> Result<(i32, i32)> {
        self()
    }
}

#[derive(Default)]
pub(crate) struct AnchorTracker {
    anchor: Option<Box<dyn Anchor>>,
    x: i32,
    y: i32,
}

impl AnchorTracker {
    pub fn attach(&mut self, anchor: Option<Box<dyn Anchor>>) {
        self.anchor = anchor;
    }

    pub fn is_attached(&self) -> bool {
        self.anchor.is_some()
    }

    /// Writes the `x`/`y` hints for every coordinate that moved since the
    /// last refresh. Returns whether anything changed.
    pub fn refresh(&mut self, hints: &mut Hints) -> Result<bool> {
        let Some(anchor) = self.anchor.as_ref() else {
            return Ok(false);
        };

        let (x, y) = anchor.screen_center()?;
        let mut changed = false;

        if x != self.x {
            hints.set("x", Hint::Int32(x))?;
            self.x = x;
            changed = true;
        }

        if y != self.y {
            hints.set("y", Hint::Int32(y))?;
            self.y = y;
            changed = true;
        }

        Ok(changed)
    }
}
