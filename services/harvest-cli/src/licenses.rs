//! SPDX license table.

use harvester::{LicenseInfo, LicenseLookup};

/// (SPDX id, canonical license text URL)
const LICENSES: &[(&str, &str)] = &[
    ("CC0-1.0", "https://creativecommons.org/publicdomain/zero/1.0/legalcode"),
    ("CC-BY-3.0", "https://creativecommons.org/licenses/by/3.0/legalcode"),
    ("CC-BY-4.0", "https://creativecommons.org/licenses/by/4.0/legalcode"),
    ("CC-BY-SA-3.0", "https://creativecommons.org/licenses/by-sa/3.0/legalcode"),
    ("CC-BY-SA-4.0", "https://creativecommons.org/licenses/by-sa/4.0/legalcode"),
    ("CC-BY-NC-4.0", "https://creativecommons.org/licenses/by-nc/4.0/legalcode"),
    ("CC-BY-NC-SA-4.0", "https://creativecommons.org/licenses/by-nc-sa/4.0/legalcode"),
    ("CC-BY-ND-4.0", "https://creativecommons.org/licenses/by-nd/4.0/legalcode"),
    ("ODbL-1.0", "https://opendatacommons.org/licenses/odbl/1-0/"),
    ("ODC-By-1.0", "https://opendatacommons.org/licenses/by/1-0/"),
    ("PDDL-1.0", "https://opendatacommons.org/licenses/pddl/1-0/"),
    ("MIT", "https://opensource.org/licenses/MIT"),
    ("Apache-2.0", "https://www.apache.org/licenses/LICENSE-2.0"),
    ("BSD-3-Clause", "https://opensource.org/licenses/BSD-3-Clause"),
    ("GPL-3.0-only", "https://www.gnu.org/licenses/gpl-3.0-standalone.html"),
    ("LGPL-3.0-only", "https://www.gnu.org/licenses/lgpl-3.0-standalone.html"),
    ("etalab-2.0", "https://www.etalab.gouv.fr/wp-content/uploads/2017/04/ETALAB-Licence-Ouverte-v2.0.pdf"),
];

/// Static SPDX lookup. Ids match case-insensitively and resolve to their canonical spelling.
pub struct SpdxLicenses;

impl LicenseLookup for SpdxLicenses {
    fn lookup(&self, id: &str) -> Option<LicenseInfo> {
        let id = id.trim();
        LICENSES
            .iter()
            .find(|(spdx, _)| spdx.eq_ignore_ascii_case(id))
            .map(|(spdx, url)| LicenseInfo {
                id: spdx.to_string(),
                sources: vec![
                    format!("https://spdx.org/licenses/{}.html", spdx),
                    url.to_string(),
                ],
            })
    }
}
