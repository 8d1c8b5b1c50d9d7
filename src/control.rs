//! Command API
//!
//! Every method returns once the command was written and, where the
//! processor confirms it, once the confirmation arrived or timed out.
//! Failures are logged; state catches up through the next status line.

use crate::device::StormAudioDevice;
use crate::error::StormAudioError;
use crate::protocol::{
    absolute_to_relative, response, Command, Matcher, Navigation, ToneAction, ToneControl,
};
use crate::state::{
    auro_preset_id, upmixer_mode_id, DolbyMode, LoudnessMode, PowerState, MAX_AURO_STRENGTH,
};

impl StormAudioDevice {
    // ========== Power Control ==========

    /// Power on and wait until the processor reports it is fully up
    ///
    /// Booting is slow, so this waits up to `Timeouts::power_on`.
    pub async fn power_on(&self) {
        self.confirm(
            &[Command::PowerOn, Command::ProcState],
            Matcher::exact(response::PROC_STATE_ON),
            self.timeouts().power_on,
        )
        .await;
    }

    pub async fn power_off(&self) {
        self.confirm(
            &[Command::PowerOff, Command::ProcState],
            Matcher::exact(response::PROC_STATE_OFF),
            self.timeouts().response,
        )
        .await;
    }

    /// Toggle power, accepting whichever confirmation arrives first
    ///
    /// Either the power echo or the final proc-state settles a branch.
    /// Returns the branch taken, or `None` if neither showed up in time.
    pub async fn power_toggle(&self) -> Option<PowerState> {
        let branches = [
            (response::PROC_STATE_ON, PowerState::On),
            (response::POWER_ON, PowerState::On),
            (response::PROC_STATE_OFF, PowerState::Off),
            (response::POWER_OFF, PowerState::Off),
        ];
        let matchers: Vec<Matcher> =
            branches.iter().map(|(line, _)| Matcher::exact(*line)).collect();

        let index = self
            .race(&Command::PowerToggle, matchers, self.timeouts().power_on)
            .await?;
        let state = branches[index].1;
        tracing::debug!("[{}] Power toggled to {}", self.log_id(), state);
        Some(state)
    }

    // ========== Mute Control ==========

    pub async fn mute_on(&self) {
        let matcher = Matcher::exact(response::MUTE_ON);
        self.confirm(&[Command::MuteOn], matcher, self.timeouts().response).await;
    }

    pub async fn mute_off(&self) {
        let matcher = Matcher::exact(response::MUTE_OFF);
        self.confirm(&[Command::MuteOff], matcher, self.timeouts().response).await;
    }

    pub async fn mute_toggle(&self) {
        self.race(
            &Command::MuteToggle,
            vec![Matcher::exact(response::MUTE_ON), Matcher::exact(response::MUTE_OFF)],
            self.timeouts().response,
        )
        .await;
    }

    // ========== Volume Control ==========

    /// Set the volume on the 0..=100 scale
    ///
    /// Out-of-range values are clamped before conversion to the device's
    /// -100..=0 scale.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use stormaudio_isp::{DeviceConfig, StormAudioDevice};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let device = StormAudioDevice::new(DeviceConfig::new("isp", "Cinema", "192.168.1.50"));
    /// device.connect().await?;
    /// device.set_volume(150).await; // sends ssp.vol.[0]
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set_volume(&self, volume: i32) {
        let relative = absolute_to_relative(volume);
        self.confirm(
            &[Command::Volume(relative)],
            Matcher::prefix(response::VOLUME_VALUE),
            self.timeouts().response,
        )
        .await;
    }

    /// One dB up
    pub async fn volume_up(&self) {
        let matcher = Matcher::prefix(response::VOLUME_VALUE);
        self.confirm(&[Command::VolumeUp], matcher, self.timeouts().response).await;
    }

    /// One dB down
    pub async fn volume_down(&self) {
        let matcher = Matcher::prefix(response::VOLUME_VALUE);
        self.confirm(&[Command::VolumeDown], matcher, self.timeouts().response).await;
    }

    // ========== Source / Mode Selection ==========

    /// Select an input by its display name
    pub async fn select_source(&self, source: &str) {
        let Some(id) = self.attributes().sources.get(source) else {
            tracing::warn!("[{}] Unknown source: {}", self.log_id(), source);
            return;
        };
        self.confirm_echo(Command::Input(id)).await;
    }

    /// Request an upmixer mode by display name
    pub async fn select_sound_mode(&self, mode: &str) {
        match upmixer_mode_id(mode) {
            Some(id) => {
                self.send(&Command::SurroundMode(id));
            }
            None => tracing::warn!("[{}] Unknown sound mode: {}", self.log_id(), mode),
        }
    }

    // ========== Navigation ==========

    pub async fn cursor_up(&self) {
        self.navigate(Navigation::Up).await;
    }

    pub async fn cursor_down(&self) {
        self.navigate(Navigation::Down).await;
    }

    pub async fn cursor_left(&self) {
        self.navigate(Navigation::Left).await;
    }

    pub async fn cursor_right(&self) {
        self.navigate(Navigation::Right).await;
    }

    pub async fn cursor_enter(&self) {
        self.navigate(Navigation::Ok).await;
    }

    pub async fn back(&self) {
        self.navigate(Navigation::Back).await;
    }

    /// Navigation keys are echoed back verbatim
    async fn navigate(&self, key: Navigation) {
        self.confirm_echo(Command::Navigate(key)).await;
    }

    // ========== Presets ==========

    pub async fn preset_next(&self) {
        self.send(&Command::PresetNext);
    }

    pub async fn preset_prev(&self) {
        self.send(&Command::PresetPrev);
    }

    /// Select a preset by its display name
    pub async fn select_preset(&self, preset: &str) {
        let Some(id) = self.attributes().presets.get(preset) else {
            tracing::warn!("[{}] Unknown preset: {}", self.log_id(), preset);
            return;
        };
        self.confirm_echo(Command::Preset(id)).await;
    }

    // ========== Audio Processing ==========

    pub async fn set_loudness(&self, mode: LoudnessMode) {
        self.confirm_echo(Command::Loudness(mode.id())).await;
    }

    pub async fn set_dolby_mode(&self, mode: DolbyMode) {
        self.confirm_echo(Command::DolbyMode(mode.id())).await;
    }

    /// Nudge or reset a tone control; confirmed by its next value line
    pub async fn tone(&self, control: ToneControl, action: ToneAction) {
        let value_prefix = format!("{}[", control.response_prefix());
        self.confirm(
            &[Command::Tone(control, action)],
            Matcher::prefix(value_prefix),
            self.timeouts().response,
        )
        .await;
    }

    pub async fn storm_xt_on(&self) {
        self.send(&Command::StormXtOn);
    }

    pub async fn storm_xt_off(&self) {
        self.send(&Command::StormXtOff);
    }

    pub async fn storm_xt_toggle(&self) {
        self.send(&Command::StormXtToggle);
    }

    /// Select an Auro-Matic preset by name (Small, Medium, Large, Speech)
    pub async fn set_auro_preset(&self, preset: &str) {
        match auro_preset_id(preset) {
            Some(id) => {
                self.send(&Command::AuroPreset(id));
            }
            None => tracing::warn!("[{}] Unknown Auro-Matic preset: {}", self.log_id(), preset),
        }
    }

    /// Set the Auro-Matic strength, 0..=14
    pub async fn set_auro_strength(&self, strength: i64) {
        if !(0..=MAX_AURO_STRENGTH).contains(&strength) {
            let e = StormAudioError::InvalidArgument(format!("Auro-Matic strength {}", strength));
            tracing::error!("[{}] {}", self.log_id(), e);
            return;
        }
        self.send(&Command::AuroStrength(strength));
    }

    // ========== Passthrough ==========

    /// Send any command line the processor understands
    pub async fn send_raw(&self, line: &str) {
        self.send(&Command::Raw(line.to_string()));
    }

    /// Send `command` and wait for the processor to repeat it
    async fn confirm_echo(&self, command: Command) {
        let echo = Matcher::exact(command.to_line().into_owned());
        self.confirm(&[command], echo, self.timeouts().response).await;
    }
}
