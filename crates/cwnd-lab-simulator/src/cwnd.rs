use cwnd_lab_abstract::WindowParams;

/// Congestion-window evolution for the point-to-point transport.
///
/// One slow-start/AIMD skeleton serves every variant; the variant only
/// parameterizes it (see `TcpVariant::window_params`). Growth is driven
/// by delivered segments, collapse by drops.
#[derive(Debug)]
pub struct WindowModel {
    cwnd: u32,
    ssthresh: u32,
    params: WindowParams,
}

impl WindowModel {
    pub fn new(params: WindowParams) -> Self {
        Self {
            cwnd: params.initial_window_segs * params.mss,
            ssthresh: params.initial_ssthresh,
            params,
        }
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn on_delivered(&mut self, bytes: u32) {
        let seg = bytes.clamp(1, self.params.mss);
        if self.cwnd < self.ssthresh {
            self.cwnd = self
                .cwnd
                .saturating_add(seg * self.params.slow_start_gain);
        } else {
            // Congestion avoidance: roughly one segment per window's worth
            // of deliveries.
            let inc = self.params.mss as u64 * self.params.mss as u64 / self.cwnd.max(1) as u64;
            self.cwnd = self.cwnd.saturating_add((inc as u32).max(1));
        }
    }

    pub fn on_loss(&mut self) {
        let floor = 2 * self.params.mss;
        let reduced = (self.cwnd as u64 * self.params.beta_pct as u64 / 100) as u32;
        self.ssthresh = reduced.max(floor);
        self.cwnd = self.ssthresh;
    }
}

#[cfg(test)]
mod tests {
    use super::WindowModel;
    use cwnd_lab_abstract::TcpVariant;

    #[test]
    fn slow_start_grows_per_delivered_segment() {
        let mut window = WindowModel::new(TcpVariant::NewReno.window_params(512));
        let initial = window.cwnd();
        window.on_delivered(512);
        assert_eq!(window.cwnd(), initial + 512);
    }

    #[test]
    fn loss_shrinks_window_and_threshold() {
        let mut window = WindowModel::new(TcpVariant::NewReno.window_params(512));
        for _ in 0..100 {
            window.on_delivered(512);
        }
        let before = window.cwnd();
        window.on_loss();
        assert!(window.cwnd() < before);
        assert_eq!(window.cwnd(), window.ssthresh());
        assert!(window.cwnd() >= 2 * 512);
    }

    #[test]
    fn avoidance_growth_is_sublinear() {
        let mut window = WindowModel::new(TcpVariant::NewReno.window_params(512));
        // Push past ssthresh so growth switches to congestion avoidance.
        while window.cwnd() < window.ssthresh() {
            window.on_delivered(512);
        }
        let before = window.cwnd();
        window.on_delivered(512);
        let growth = window.cwnd() - before;
        assert!(growth >= 1);
        assert!(growth < 512);
    }
}
