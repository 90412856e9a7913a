use std::time::Duration;

/// Built-in OUI (Organizationally Unique Identifier) database
/// This serves as a fallback when the external manuf.txt file is not available
pub const BUILTIN_OUI: &str = r#"
00:00:5E   IANA
00:17:F2   Apple, Inc.
00:1C:B3   Apple, Inc.
00:26:BB   Apple, Inc.
3C:22:FB   Apple, Inc.
F0:18:98   Apple, Inc.
00:1A:11   Google, Inc.
F4:F5:D8   Google, Inc.
D8:27:27   Samsung Electronics Co.,Ltd
8C:77:12   Samsung Electronics Co.,Ltd
B8:27:EB   Raspberry Pi Foundation
DC:A6:32   Raspberry Pi Trading Ltd
00:0C:29   VMware, Inc.
00:50:56   VMware, Inc.
08:00:27   PCS Systemtechnik GmbH
00:0F:FE   Intel Corporate
3C:97:0E   Intel Corporate
00:15:5D   Microsoft Corporation
00:0D:3A   Microsoft Corporation
00:00:0C   Cisco Systems, Inc
00:01:42   Cisco Systems, Inc
F0:9F:C2   Ubiquiti Inc
50:C7:BF   TP-LINK TECHNOLOGIES CO.,LTD.
A0:40:A0   NETGEAR
00:1B:A9   Brother Industries, Ltd.
00:00:48   Seiko Epson Corporation
3C:D9:2B   Hewlett Packard
00:11:32   Synology Incorporated
24:5E:BE   QNAP Systems, Inc.
44:19:B6   Hangzhou Hikvision Digital Technology Co.,Ltd.
B0:C5:54   D-Link International
00:0E:58   Sonos, Inc.
FC:65:DE   Amazon Technologies Inc.
"#;

/// File next to the executable holding user-taught vendor prefixes
pub const LEARNED_VENDOR_FILE: &str = "vendor_learned.txt";

/// User agent sent by the HTTP banner probe
pub const HTTP_USER_AGENT: &str = "Mozilla/5.0 (compatible; lanwatch/0.3)";

/// Ports tried by the HTTP banner probe, in order
pub const HTTP_BANNER_PORTS: [u16; 4] = [80, 443, 8080, 8443];

/// Ports attempted by the fast strategy, in order
pub const FAST_PORTS: [u16; 3] = [80, 443, 445];

/// Hard cap on a single conservative probe
pub const CONSERVATIVE_PROBE_CAP: Duration = Duration::from_millis(300);

/// Default re-resolution age for hostnames
pub const HOSTNAME_MAX_AGE: Duration = Duration::from_secs(300);

/// Mid-interval step between reachability and UI refreshes
pub const REFRESH_STEP: Duration = Duration::from_secs(5);

/// Default watch interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Largest number of ports a single `a-b` inspector range expands to, past the start
pub const MAX_RANGE_SPAN: u16 = 100;

/// Default inspector port specification
pub const DEFAULT_INSPECT_SPEC: &str = "icmp,22,80,443,445,3389";

/// Service names shown by the inspector for well-known ports
pub fn service_name(port: u16) -> &'static str {
    match port {
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        67 => "dhcp",
        69 => "tftp",
        80 => "http",
        88 => "kerberos",
        110 => "pop3",
        111 => "rpcbind",
        123 => "ntp",
        135 => "msrpc",
        137 => "netbios-ns",
        139 => "netbios-ssn",
        143 => "imap",
        161 => "snmp",
        389 => "ldap",
        443 => "https",
        445 => "smb",
        465 => "smtps",
        515 => "printer",
        548 => "afp",
        554 => "rtsp",
        587 => "submission",
        631 => "ipp",
        636 => "ldaps",
        873 => "rsync",
        993 => "imaps",
        995 => "pop3s",
        1080 => "socks",
        1433 => "mssql",
        1723 => "pptp",
        1883 => "mqtt",
        1900 => "upnp",
        2049 => "nfs",
        3000 => "http-alt",
        3306 => "mysql",
        3389 => "rdp",
        5000 => "upnp",
        5353 => "mdns",
        5432 => "postgresql",
        5900 => "vnc",
        6379 => "redis",
        8000 => "http-alt",
        8008 => "http-alt",
        8080 => "http-proxy",
        8443 => "https-alt",
        8883 => "mqtts",
        9100 => "jetdirect",
        27017 => "mongodb",
        32400 => "plex",
        62078 => "iphone-sync",
        _ => "",
    }
}
