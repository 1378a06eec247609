use crate::types::{Margins, Pt, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn of(page_number: usize) -> Self {
        if page_number % 2 == 1 {
            Parity::Odd
        } else {
            Parity::Even
        }
    }
}

/// The page currently being laid out. Superseded on every page break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext {
    pub page_number: usize,
    pub structural: bool,
}

impl PageContext {
    pub fn new(page_number: usize, structural: bool) -> Self {
        Self {
            page_number,
            structural,
        }
    }

    pub fn parity(&self) -> Parity {
        Parity::of(self.page_number)
    }
}

/// Writable area of one page. Always derived, never stored across page breaks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub left: Pt,
    pub right: Pt,
    pub top: Pt,
    pub bottom: Pt,
    pub content_width: Pt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    page_size: Size,
    base: Margins,
    sidebar_width: Pt,
    sidebar_gap: Pt,
}

impl PageGeometry {
    pub fn new(page_size: Size, base: Margins, sidebar_width: Pt, sidebar_gap: Pt) -> Self {
        Self {
            page_size,
            base,
            sidebar_width,
            sidebar_gap,
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn base_margins(&self) -> Margins {
        self.base
    }

    /// Width taken away from content pages by the sidebar band and its gap.
    pub fn reserved_band(&self) -> Pt {
        self.sidebar_width + self.sidebar_gap
    }

    /// Odd pages reserve the band on the left, even pages on the right.
    /// Structural pages (cover, contents) get the plain base margins.
    pub fn margins_for(&self, page_number: usize, structural: bool) -> PageMargins {
        let (mut left, mut right) = (self.base.left, self.base.right);
        if !structural {
            match Parity::of(page_number) {
                Parity::Odd => left += self.reserved_band(),
                Parity::Even => right += self.reserved_band(),
            }
        }
        PageMargins {
            left,
            right,
            top: self.base.top,
            bottom: self.base.bottom,
            content_width: self.page_size.width - left - right,
        }
    }

    pub fn margins(&self, ctx: PageContext) -> PageMargins {
        self.margins_for(ctx.page_number, ctx.structural)
    }

    /// Lowest y (top-left coordinates) content may reach.
    pub fn content_bottom(&self) -> Pt {
        self.page_size.height - self.base.bottom
    }

    pub fn writable_height(&self) -> Pt {
        self.content_bottom() - self.base.top
    }

    /// Rectangle of the sidebar band on a content page.
    pub fn sidebar_band(&self, page_number: usize) -> Rect {
        let x = match Parity::of(page_number) {
            Parity::Odd => self.base.left,
            Parity::Even => self.page_size.width - self.base.right - self.sidebar_width,
        };
        Rect {
            x,
            y: self.base.top,
            width: self.sidebar_width,
            height: self.writable_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PageGeometry {
        PageGeometry::new(
            Size::a4(),
            Margins::all(36.0),
            Pt::from_i32(28),
            Pt::from_i32(14),
        )
    }

    #[test]
    fn sidebar_flips_every_page() {
        let g = geometry();
        for n in 1..40 {
            let here = g.margins_for(n, false);
            let next = g.margins_for(n + 1, false);
            assert_ne!(here.left, next.left, "page {n}");
            assert_eq!(here.content_width, next.content_width);
        }
    }

    #[test]
    fn sidebar_strictly_narrows_content() {
        let g = geometry();
        let full = Size::a4().width - Pt::from_i32(36) * 2;
        for n in 1..20 {
            let content = g.margins_for(n, false);
            let structural = g.margins_for(n, true);
            assert!(content.content_width < full);
            assert_eq!(structural.content_width, full);
            assert_eq!(
                structural.content_width - content.content_width,
                g.reserved_band()
            );
            assert_eq!(
                content.content_width,
                Size::a4().width - content.left - content.right
            );
        }
    }

    #[test]
    fn margins_are_idempotent() {
        let g = geometry();
        assert_eq!(g.margins_for(7, false), g.margins_for(7, false));
        assert_eq!(g.margins(PageContext::new(7, true)), g.margins_for(7, true));
    }

    #[test]
    fn band_sits_inside_reserved_side() {
        let g = geometry();
        let odd = g.sidebar_band(1);
        let odd_margins = g.margins_for(1, false);
        assert_eq!(odd.x, Pt::from_i32(36));
        assert!(odd.x + odd.width < odd_margins.left);

        let even = g.sidebar_band(2);
        let even_margins = g.margins_for(2, false);
        let content_right = Size::a4().width - even_margins.right;
        assert!(even.x > content_right);
        assert_eq!(even.x + even.width, Size::a4().width - Pt::from_i32(36));
        assert_eq!(PageContext::new(2, false).parity(), Parity::Even);
    }
}
