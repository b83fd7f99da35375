//! GSM 06.10 decoder signal path (ETSI GSM 06.10, Section 4.3).

use crate::fixed::{abs, add, asl, asr, mult_r, sub};

use super::{
    constants::{
        B, DEEMPHASIS, FAC, FRAME_LEN, INITIAL_PITCH_LAG, INVA, MAX_PITCH_LAG, MIC, MIN_PITCH_LAG,
        QLB, RPE_PULSES, SEGMENT_ENDS, SUBFRAME_LEN,
    },
    frame::{GsmFrame, GsmSubframe},
};

const HISTORY_LEN: usize = 280;
/// Index of the newest reconstructed subframe within the history buffer
const HISTORY_TAIL: usize = 120;

/// Filter memory carried from frame to frame.
#[derive(Debug, Clone)]
pub struct SynthesisState {
    /// Reconstructed short-term residual; `[0, 120)` is the pitch history
    dp0: [i16; HISTORY_LEN],
    /// Lattice filter register
    v: [i16; 9],
    /// De-emphasis register
    msr: i16,
    /// Last valid pitch lag
    nrp: i16,
    /// Decoded LARs of the current and previous frame
    larpp: [[i16; 8]; 2],
    j: usize,
}

impl Default for SynthesisState {
    fn default() -> Self {
        Self {
            dp0: [0; HISTORY_LEN],
            v: [0; 9],
            msr: 0,
            nrp: INITIAL_PITCH_LAG,
            larpp: [[0; 8]; 2],
            j: 0,
        }
    }
}

impl SynthesisState {
    /// Decodes one frame into 160 samples.
    pub fn decode_frame(&mut self, frame: &GsmFrame) -> [i16; FRAME_LEN] {
        let mut wt = [0i16; FRAME_LEN];
        let mut out = [0i16; FRAME_LEN];

        for (subframe, residual) in frame
            .subframes
            .iter()
            .zip(wt.chunks_exact_mut(SUBFRAME_LEN))
        {
            let erp = rpe_decode(subframe);
            self.long_term_synthesis(subframe.nc, subframe.bc, &erp);
            residual.copy_from_slice(&self.dp0[HISTORY_TAIL..HISTORY_TAIL + SUBFRAME_LEN]);
        }

        self.short_term_synthesis(&frame.larc, &wt, &mut out);
        self.postprocess(&mut out);
        out
    }

    #[allow(clippy::cast_sign_loss)]
    fn long_term_synthesis(&mut self, nc: i16, bc: i16, erp: &[i16; SUBFRAME_LEN]) {
        let nr = if (MIN_PITCH_LAG..=MAX_PITCH_LAG).contains(&nc) {
            nc
        } else {
            self.nrp
        };
        self.nrp = nr;

        let lag = nr as usize;
        let brp = QLB[(bc & 3) as usize];

        for (k, &e) in erp.iter().enumerate() {
            let idx = HISTORY_TAIL + k;
            self.dp0[idx] = add(e, mult_r(brp, self.dp0[idx - lag]));
        }

        self.dp0.copy_within(SUBFRAME_LEN..HISTORY_TAIL + SUBFRAME_LEN, 0);
    }

    fn short_term_synthesis(
        &mut self,
        larc: &[i16; 8],
        wt: &[i16; FRAME_LEN],
        out: &mut [i16; FRAME_LEN],
    ) {
        let current = self.j;
        self.j ^= 1;
        let previous = self.j;

        self.larpp[current] = decode_lar(larc);
        let prev = self.larpp[previous];
        let cur = self.larpp[current];

        let mut start = 0;
        for (segment, &end) in SEGMENT_ENDS.iter().enumerate() {
            let mut rp: [i16; 8] = std::array::from_fn(|i| match segment {
                0 => add(add(prev[i] >> 2, cur[i] >> 2), prev[i] >> 1),
                1 => add(prev[i] >> 1, cur[i] >> 1),
                2 => add(add(prev[i] >> 2, cur[i] >> 2), cur[i] >> 1),
                _ => cur[i],
            });
            lar_to_rp(&mut rp);
            self.lattice(&rp, &wt[start..end], &mut out[start..end]);
            start = end;
        }
    }

    fn lattice(&mut self, rrp: &[i16; 8], wt: &[i16], sr: &mut [i16]) {
        for (&w, out) in wt.iter().zip(sr.iter_mut()) {
            let mut sri = w;
            for i in (0..8).rev() {
                sri = sub(sri, mult_r(rrp[i], self.v[i]));
                self.v[i + 1] = add(self.v[i], mult_r(rrp[i], sri));
            }
            self.v[0] = sri;
            *out = sri;
        }
    }

    fn postprocess(&mut self, samples: &mut [i16; FRAME_LEN]) {
        let mut msr = self.msr;
        for s in samples.iter_mut() {
            msr = add(*s, mult_r(msr, DEEMPHASIS));
            *s = add(msr, msr) & !7;
        }
        self.msr = msr;
    }
}

/// Splits the 6-bit block amplitude into exponent and mantissa.
fn xmaxc_to_exp_mant(xmaxc: i16) -> (i16, i16) {
    let mut exp = 0;
    if xmaxc > 15 {
        exp = (xmaxc >> 3) - 1;
    }
    let mut mant = xmaxc - (exp << 3);

    if mant == 0 {
        return (-4, 7);
    }
    while mant <= 7 {
        mant = (mant << 1) | 1;
        exp -= 1;
    }
    (exp, mant - 8)
}

/// APCM inverse quantization and RPE grid positioning.
#[allow(clippy::cast_sign_loss)]
fn rpe_decode(sub_frame: &GsmSubframe) -> [i16; SUBFRAME_LEN] {
    let (exp, mant) = xmaxc_to_exp_mant(sub_frame.xmaxc);

    let temp1 = FAC[mant as usize];
    let temp2 = sub(6, exp);
    let temp3 = asl(1, sub(temp2, 1));

    let mut erp = [0i16; SUBFRAME_LEN];
    let offset = (sub_frame.mc & 3) as usize;

    for (i, &xmc) in sub_frame.xmc.iter().enumerate().take(RPE_PULSES) {
        let temp = ((xmc << 1) - 7) << 12;
        let temp = add(mult_r(temp1, temp), temp3);
        erp[offset + 3 * i] = asr(temp, temp2);
    }

    erp
}

/// Decodes LAR codes into LAR values (Section 4.2.15).
fn decode_lar(larc: &[i16; 8]) -> [i16; 8] {
    std::array::from_fn(|i| {
        let temp = add(larc[i], MIC[i]) << 10;
        let temp = sub(temp, B[i] << 1);
        let temp = mult_r(INVA[i], temp);
        add(temp, temp)
    })
}

/// Converts interpolated LARs to reflection coefficients in place.
fn lar_to_rp(larp: &mut [i16; 8]) {
    for value in larp.iter_mut() {
        let temp = abs(*value);
        let magnitude = if temp < 11059 {
            temp << 1
        } else if temp < 20070 {
            temp + 11059
        } else {
            add(temp >> 2, 26112)
        };
        *value = if *value < 0 { -magnitude } else { magnitude };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(0, -4, 7; "zero amplitude")]
    #[test_case(1, -3, 7; "one")]
    #[test_case(2, -2, 3; "two")]
    #[test_case(7, -1, 7; "seven")]
    #[test_case(8, 0, 0; "eight")]
    #[test_case(15, 0, 7; "fifteen")]
    #[test_case(16, 1, 0; "sixteen")]
    #[test_case(63, 6, 7; "maximum")]
    fn test_xmaxc_to_exp_mant(xmaxc: i16, exp: i16, mant: i16) {
        assert_eq!(xmaxc_to_exp_mant(xmaxc), (exp, mant));
    }

    #[test_log::test]
    fn test_rpe_decode_places_pulses_on_grid() {
        let subframe = GsmSubframe {
            mc: 2,
            xmaxc: 63,
            xmc: [7; RPE_PULSES],
            ..GsmSubframe::default()
        };
        let erp = rpe_decode(&subframe);

        for (k, &value) in erp.iter().enumerate() {
            if k >= 2 && (k - 2) % 3 == 0 {
                assert!(value > 0, "pulse missing at {k}");
            } else {
                assert_eq!(value, 0, "unexpected pulse at {k}");
            }
        }
    }

    #[test_log::test]
    fn test_rpe_decode_maximum_amplitude() {
        // exp 6 shifts by zero and the rounding term asl(1, -1) is zero
        let subframe = GsmSubframe {
            mc: 0,
            xmaxc: 63,
            xmc: [7; RPE_PULSES],
            ..GsmSubframe::default()
        };
        let erp = rpe_decode(&subframe);
        assert_eq!(erp[0], mult_r(32767, 7 << 12));
    }

    #[test_log::test]
    fn test_lar_to_rp_regimes() {
        let mut larp = [100, -100, 15000, -15000, 30000, -30000, i16::MIN, 0];
        lar_to_rp(&mut larp);
        assert_eq!(
            larp,
            [200, -200, 26059, -26059, 32767, -32767, -32767, 0]
        );
    }

    #[test_log::test]
    fn test_long_term_lag_falls_back_to_last_valid() {
        let mut state = SynthesisState::default();
        let erp = [0i16; SUBFRAME_LEN];

        state.long_term_synthesis(80, 0, &erp);
        assert_eq!(state.nrp, 80);

        state.long_term_synthesis(10, 0, &erp);
        assert_eq!(state.nrp, 80);

        state.long_term_synthesis(121, 0, &erp);
        assert_eq!(state.nrp, 80);

        state.long_term_synthesis(120, 0, &erp);
        assert_eq!(state.nrp, 120);
    }

    #[test_log::test]
    fn test_long_term_shifts_history() {
        let mut state = SynthesisState::default();
        let mut erp = [0i16; SUBFRAME_LEN];
        erp[0] = 1000;

        state.long_term_synthesis(40, 0, &erp);
        assert_eq!(state.dp0[HISTORY_TAIL], 1000);
        assert_eq!(state.dp0[HISTORY_TAIL - SUBFRAME_LEN], 1000);
    }

    #[test_log::test]
    fn test_quiet_frame_stays_quiet() {
        let mut state = SynthesisState::default();
        let mut frame = GsmFrame::default();
        frame.larc = [32, 32, 16, 16, 8, 8, 4, 4];
        for subframe in &mut frame.subframes {
            subframe.nc = 40;
            // smallest pulse magnitude at the smallest block amplitude
            subframe.xmc = [4; RPE_PULSES];
        }

        let out = state.decode_frame(&frame);

        assert!(out.iter().all(|&s| s.abs() < 1024), "{out:?}");
        assert!(out.iter().all(|&s| s & 7 == 0));
    }

    #[test_log::test]
    fn test_lar_pair_toggles_between_frames() {
        let mut state = SynthesisState::default();
        let frame = GsmFrame::default();

        state.decode_frame(&frame);
        assert_eq!(state.j, 1);
        assert_eq!(state.larpp[0], decode_lar(&frame.larc));

        state.decode_frame(&frame);
        assert_eq!(state.j, 0);
        assert_eq!(state.larpp[1], decode_lar(&frame.larc));
    }
}
