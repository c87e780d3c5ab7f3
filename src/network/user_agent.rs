use rand::seq::SliceRandom;
use rand::Rng;

/// Centralized random User-Agent generator.
///
/// Some of the upstream services this tool talks to (notably the gov.uk
/// scrape) respond differently to obvious non-browser agents, so the
/// generated strings stay within plausible modern browser ranges.
pub struct UserAgent;

impl UserAgent {
    /// Returns a random realistic desktop User-Agent.
    pub fn random() -> String {
        let mut rng = rand::thread_rng();
        let generators: &[fn(&mut rand::rngs::ThreadRng) -> String] = &[
            Self::ua_win_chrome,
            Self::ua_win_firefox,
            Self::ua_macos_chrome,
            Self::ua_macos_safari,
            Self::ua_linux_chrome,
            Self::ua_linux_firefox,
        ];
        let f = generators.choose(&mut rng).expect("generators not empty");
        f(&mut rng)
    }

    fn ua_win_chrome(rng: &mut rand::rngs::ThreadRng) -> String {
        let win_nt = Self::pick(rng, &["10.0", "10.0", "11.0"]);
        let (chrome, build, patch) = Self::chrome_ver(rng);
        format!("Mozilla/5.0 (Windows NT {win_nt}; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome}.{patch}.{build} Safari/537.36")
    }

    fn ua_win_firefox(rng: &mut rand::rngs::ThreadRng) -> String {
        let win_nt = Self::pick(rng, &["10.0", "10.0", "11.0"]);
        let ff = Self::firefox_major(rng);
        format!("Mozilla/5.0 (Windows NT {win_nt}; Win64; x64; rv:{ff}.0) Gecko/20100101 Firefox/{ff}.0")
    }

    fn ua_macos_chrome(rng: &mut rand::rngs::ThreadRng) -> String {
        let mac = Self::pick(rng, &["10_15_7", "12_7_6", "13_6_7", "14_5", "14_6"]);
        let (chrome, build, patch) = Self::chrome_ver(rng);
        format!("Mozilla/5.0 (Macintosh; Intel Mac OS X {mac}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome}.{patch}.{build} Safari/537.36")
    }

    fn ua_macos_safari(rng: &mut rand::rngs::ThreadRng) -> String {
        let mac = Self::pick(rng, &["12_7_6", "13_6_7", "14_5", "14_6"]);
        let safari_ver = Self::pick(rng, &["16.6", "17.3", "17.4", "17.5", "17.6"]);
        format!("Mozilla/5.0 (Macintosh; Intel Mac OS X {mac}) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{safari_ver} Safari/605.1.15")
    }

    fn ua_linux_chrome(rng: &mut rand::rngs::ThreadRng) -> String {
        let (chrome, build, patch) = Self::chrome_ver(rng);
        format!("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome}.{patch}.{build} Safari/537.36")
    }

    fn ua_linux_firefox(rng: &mut rand::rngs::ThreadRng) -> String {
        let ff = Self::firefox_major(rng);
        format!("Mozilla/5.0 (X11; Linux x86_64; rv:{ff}.0) Gecko/20100101 Firefox/{ff}.0")
    }

    fn pick<T: Clone>(rng: &mut rand::rngs::ThreadRng, vals: &[T]) -> T {
        vals.choose(rng).expect("slice not empty").clone()
    }

    /// Chrome version triplet within plausible current ranges
    fn chrome_ver(rng: &mut rand::rngs::ThreadRng) -> (u32, u32, u32) {
        let major = rng.gen_range(120..=128);
        let build = rng.gen_range(6000..=7100);
        let patch = rng.gen_range(10..=200);
        (major, build, patch)
    }

    fn firefox_major(rng: &mut rand::rngs::ThreadRng) -> u32 {
        rng.gen_range(115..=130)
    }
}

/// Returns a random realistic User-Agent.
pub fn random_user_agent() -> String {
    UserAgent::random()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_user_agent() {
        let ua = random_user_agent();
        assert!(
            ua.starts_with("Mozilla/5.0"),
            "UA must start with Mozilla/5.0, got: {ua}"
        );
        assert!(ua.len() > 40, "UA too short: {ua}");
    }

    #[test]
    fn generates_desktop_platforms_only() {
        for _ in 0..20 {
            let ua = random_user_agent();
            assert!(
                ua.contains("Windows NT") || ua.contains("Macintosh") || ua.contains("Linux"),
                "UA must mention Windows/macOS/Linux. UA: {ua}"
            );
        }
    }
}
