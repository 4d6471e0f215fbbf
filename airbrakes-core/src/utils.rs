/// returns air density (kg/m^3) at altitude (m)
/// approximated using a linear function from 0m and 3000m data from standard atmosphere model
pub fn approximate_air_density(altitude_asl: f32) -> f32 {
    (1.225 - altitude_asl * 0.0001053).max(0.0)
}

/// y at `mid_x` on the line through (lower_x, lower_y) and (upper_x, upper_y),
/// a zero width interval has a slope of 0
pub fn linearly_interpolate(lower_x: f32, lower_y: f32, upper_x: f32, upper_y: f32, mid_x: f32) -> f32 {
    let width = upper_x - lower_x;
    let slope = if width == 0.0 {
        0.0
    } else {
        (upper_y - lower_y) / width
    };
    (mid_x - lower_x) * slope + lower_y
}

/// interpolates `values`, evenly spaced over t = 0..1, extrapolates outside
pub fn lerp(t: f32, values: &[f32]) -> f32 {
    let len = values.len();
    if len < 2 {
        return values.first().copied().unwrap_or(0.0);
    }
    let spacing = 1.0f32 / ((len - 1) as f32);

    let i = ((t / spacing).max(0.0) as usize).min(len - 2);

    let t = (t - spacing * (i as f32)) * (len - 1) as f32;
    (1.0 - t) * values[i] + t * values[i + 1]
}
