use nalgebra_glm as glm;

use crate::notebook::DevicePoint;

/// A page boundary rectangle, expressed by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rectangle {
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Rectangle { llx, lly, urx, ury }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

/// The boundary boxes of a PDF page. The media box is mandatory, the others are optional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSet {
    pub trim: Option<Rectangle>,
    pub crop: Option<Rectangle>,
    pub media: Rectangle,
}

impl BoxSet {
    /// The rectangle the strokes are fitted to: the trim box when present, otherwise the media box.
    /// The flag tells whether a true trim box was found.
    pub fn crop_rectangle(&self) -> (Rectangle, bool) {
        match self.trim {
            Some(trim) => (trim, true),
            None => (self.media, false),
        }
    }
}

/// Enlarges the boxes downwards by half of the overflow, so that the page gains the vertical
/// room the device canvas needs once scaled. The crop and media boxes are also anchored to `x = 0`.
pub fn adjust_for_overflow(boxes: BoxSet, over: f64) -> BoxSet {
    let half = over / 2.0;
    BoxSet {
        trim: boxes.trim.map(|trim| Rectangle {
            lly: trim.lly - half,
            ..trim
        }),
        crop: boxes.crop.map(|crop| Rectangle {
            llx: 0.0,
            lly: crop.lly - half,
            ..crop
        }),
        media: Rectangle {
            llx: 0.0,
            lly: boxes.media.lly - half,
            ..boxes.media
        },
    }
}

/// The scale, shift and rotation mapping device space into the space of one page.
/// The scale is always uniform, so that the proportions of the strokes are preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageScale {
    pub scale_x: f64,
    pub scale_y: f64,
    pub shift_x: f64,
    pub shift_y: f64,
    pub rotate: bool,
}

impl PageScale {
    pub fn identity() -> Self {
        PageScale {
            scale_x: 1.0,
            scale_y: 1.0,
            shift_x: 0.0,
            shift_y: 0.0,
            rotate: false,
        }
    }
}

/// The outcome of fitting the device canvas onto a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFit {
    pub scale: PageScale,
    /// Extra length needed along the non-constraining axis, never negative.
    pub over: f64,
}

/// Fits the device canvas onto the page so that it covers it with a uniform scale.
///
/// Pages taller than wide are never rotated, whatever orientation is requested.
///
/// # Arguments
///
/// * `device_width` - The width of the device canvas.
/// * `device_height` - The height of the device canvas.
/// * `page` - The rectangle of the page the canvas is fitted to.
/// * `rotate` - Whether the notebook was written in landscape orientation.
pub fn fit_device_to_page(
    device_width: f64,
    device_height: f64,
    page: &Rectangle,
    rotate: bool,
) -> PageFit {
    let page_width = page.width();
    let page_height = page.height();
    let rotate = rotate && page_height <= page_width;

    let (device_width, device_height) = if rotate {
        (device_height, device_width)
    } else {
        (device_width, device_height)
    };

    let h = page_height / device_height;
    let w = page_width / device_width;

    let scale = if h > w && !rotate { h } else { w };

    let over = if rotate {
        (device_width * h - page_width) / 2.0 / h
    } else {
        (device_height * w - page_height) / 2.0 / w
    };
    let over = over.max(0.0);

    let shift_x = page.lly;
    let mut shift_y = page.lly - over;
    if rotate {
        shift_y += page_width;
    }

    PageFit {
        scale: PageScale {
            scale_x: scale,
            scale_y: scale,
            shift_x,
            shift_y,
            rotate,
        },
        over,
    }
}

/// Maps a device point into page space. The Y axis still grows downwards: drawing code flips
/// it by subtracting the result from the page height.
pub fn normalize(point: &DevicePoint, page_scale: &PageScale) -> glm::DVec2 {
    let x = f64::from(point.x);
    let y = f64::from(point.y);
    if page_scale.rotate {
        glm::vec2(
            -y * page_scale.scale_y + page_scale.shift_y,
            x * page_scale.scale_x - page_scale.shift_x,
        )
    } else {
        glm::vec2(
            x * page_scale.scale_x + page_scale.shift_x,
            y * page_scale.scale_y - page_scale.shift_y,
        )
    }
}
