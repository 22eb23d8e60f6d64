//! 预览坐标 -> 设备兴趣点 (Point of Interest) 的换算
//!
//! 设备兴趣点空间固定为横向传感器坐标：(0,0) 为 home 键在右侧时的左上角，
//! (1,1) 为右下角。预览层通常是竖屏，所以换算时 x/y 需要交换。

/// 二维点 (视图坐标或归一化坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// 归一化空间的中心点
    pub const CENTER: Point = Point { x: 0.5, y: 0.5 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 截断到 [0,1]×[0,1]
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// 预览层的缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoGravity {
    /// 拉伸铺满，不保持比例
    Resize,
    /// 保持比例完整显示 (letterbox)
    #[default]
    ResizeAspect,
    /// 保持比例铺满 (裁剪)
    ResizeAspectFill,
}

/// 预览层的几何描述，由 Preview 协作方提供
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewGeometry {
    /// 预览视图尺寸 (竖屏)
    pub view_size: Size,
    /// 视频 clean aperture (横向，width > height)
    pub aperture: Size,
    pub gravity: VideoGravity,
    /// 前置镜头预览通常是镜像的
    pub mirrored: bool,
}

impl PreviewGeometry {
    pub fn new(view_size: Size, aperture: Size, gravity: VideoGravity) -> Self {
        Self {
            view_size,
            aperture,
            gravity,
            mirrored: false,
        }
    }

    pub fn mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    /// 把视图坐标换算成设备兴趣点
    ///
    /// 落在 letterbox 黑边里的点返回中心点；越界结果会被截断到 [0,1]。
    pub fn point_of_interest(&self, view_point: Point) -> Point {
        let frame = self.view_size;
        if frame.is_degenerate() {
            return Point::CENTER;
        }

        let mut p = view_point;
        if self.mirrored {
            p.x = frame.width - p.x;
        }

        let poi = match self.gravity {
            VideoGravity::Resize => Point::new(p.y / frame.height, 1.0 - p.x / frame.width),
            _ if self.aperture.is_degenerate() => {
                // 不知道视频比例时退化为 Resize
                Point::new(p.y / frame.height, 1.0 - p.x / frame.width)
            }
            VideoGravity::ResizeAspect => self.aspect_fit(frame, p),
            VideoGravity::ResizeAspectFill => self.aspect_fill(frame, p),
        };

        poi.clamped()
    }

    fn aspect_fit(&self, frame: Size, p: Point) -> Point {
        let aperture_ratio = self.aperture.height / self.aperture.width;
        let view_ratio = frame.width / frame.height;

        if view_ratio > aperture_ratio {
            // 左右黑边
            let x2 = frame.height * aperture_ratio;
            let bar = (frame.width - x2) / 2.0;
            if p.x >= bar && p.x <= bar + x2 {
                return Point::new(p.y / frame.height, 1.0 - (p.x - bar) / x2);
            }
        } else {
            // 上下黑边
            let y2 = frame.width / aperture_ratio;
            let bar = (frame.height - y2) / 2.0;
            if p.y >= bar && p.y <= bar + y2 {
                return Point::new((p.y - bar) / y2, 1.0 - p.x / frame.width);
            }
        }
        Point::CENTER
    }

    fn aspect_fill(&self, frame: Size, p: Point) -> Point {
        let aperture_ratio = self.aperture.height / self.aperture.width;
        let view_ratio = frame.width / frame.height;

        if view_ratio > aperture_ratio {
            // 上下被裁掉
            let y2 = self.aperture.width * (frame.width / self.aperture.height);
            Point::new(
                (p.y + (y2 - frame.height) / 2.0) / y2,
                (frame.width - p.x) / frame.width,
            )
        } else {
            // 左右被裁掉
            let x2 = self.aperture.height * (frame.height / self.aperture.width);
            Point::new(
                p.y / frame.height,
                1.0 - (p.x + (x2 - frame.width) / 2.0) / x2,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Size = Size::new(100.0, 200.0);
    const HD: Size = Size::new(1920.0, 1080.0);

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn view_center_is_device_center_for_every_gravity() {
        for gravity in [
            VideoGravity::Resize,
            VideoGravity::ResizeAspect,
            VideoGravity::ResizeAspectFill,
        ] {
            let geo = PreviewGeometry::new(VIEW, HD, gravity);
            let poi = geo.point_of_interest(Point::new(50.0, 100.0));
            assert!(close(poi, Point::CENTER), "{gravity:?} -> {poi:?}");
        }
    }

    #[test]
    fn resize_rotates_into_sensor_space() {
        let geo = PreviewGeometry::new(VIEW, HD, VideoGravity::Resize);
        assert!(close(geo.point_of_interest(Point::new(0.0, 0.0)), Point::new(0.0, 1.0)));
        assert!(close(geo.point_of_interest(Point::new(100.0, 200.0)), Point::new(1.0, 0.0)));
    }

    #[test]
    fn mirrored_preview_flips_horizontally() {
        let geo = PreviewGeometry::new(VIEW, HD, VideoGravity::Resize).mirrored(true);
        assert!(close(geo.point_of_interest(Point::new(0.0, 0.0)), Point::new(0.0, 0.0)));
    }

    #[test]
    fn letterbox_bar_taps_fall_back_to_center() {
        // 100x200 的竖屏视图里 16:9 视频上下各有约 11pt 的黑边
        let geo = PreviewGeometry::new(VIEW, HD, VideoGravity::ResizeAspect);
        assert_eq!(geo.point_of_interest(Point::new(10.0, 5.0)), Point::CENTER);
        assert_eq!(geo.point_of_interest(Point::new(10.0, 195.0)), Point::CENTER);

        let inside = geo.point_of_interest(Point::new(0.0, 100.0));
        assert!(close(inside, Point::new(0.5, 1.0)));
    }

    #[test]
    fn aspect_fill_accounts_for_cropped_edges() {
        let geo = PreviewGeometry::new(VIEW, HD, VideoGravity::ResizeAspectFill);
        // 视图左边缘其实在被裁掉的区域内侧，y 不会到 1
        let left = geo.point_of_interest(Point::new(0.0, 100.0));
        assert!(left.y < 1.0 && left.y > 0.9, "{left:?}");
        assert!((left.x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_bounds_points_are_clamped() {
        let geo = PreviewGeometry::new(VIEW, HD, VideoGravity::Resize);
        let poi = geo.point_of_interest(Point::new(-50.0, 400.0));
        assert_eq!(poi, Point::new(1.0, 1.0));
    }

    #[test]
    fn degenerate_view_returns_center() {
        let geo = PreviewGeometry::new(Size::new(0.0, 0.0), HD, VideoGravity::ResizeAspect);
        assert_eq!(geo.point_of_interest(Point::new(3.0, 4.0)), Point::CENTER);
    }
}
