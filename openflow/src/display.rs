// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow rendering in the `ovs-ofctl dump-flows` dialect.

use crate::flow::{ETH_TYPE_IPV4, FlowEntry, FlowId, FlowMatch, Next, SetField};
use std::fmt::{Display, Formatter, Result};

impl Display for FlowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Display for FlowMatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut fields: Vec<String> = Vec::new();
        if let Some(port) = self.in_port {
            fields.push(format!("in_port={port}"));
        }
        match (self.ip_proto, self.eth_type) {
            (Some(proto), _) => fields.push(proto.flow_keyword().to_string()),
            (None, Some(ETH_TYPE_IPV4)) => fields.push("ip".to_string()),
            (None, Some(other)) => fields.push(format!("dl_type={other:#06x}")),
            (None, None) => {}
        }
        if let Some(ip) = self.ip_src {
            fields.push(format!("nw_src={ip}"));
        }
        if let Some(ip) = self.ip_dst {
            fields.push(format!("nw_dst={ip}"));
        }
        if let Some(port) = self.l4_src {
            fields.push(format!("tp_src={port}"));
        }
        if let Some(port) = self.l4_dst {
            fields.push(format!("tp_dst={port}"));
        }
        f.write_str(&fields.join(","))
    }
}

impl Display for SetField {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            SetField::EthDst(mac) => write!(f, "set_field:{mac}->eth_dst"),
            SetField::IpSrc(ip) => write!(f, "set_field:{ip}->ip_src"),
            SetField::IpDst(ip) => write!(f, "set_field:{ip}->ip_dst"),
            SetField::L4Src(proto, port) => {
                write!(f, "set_field:{port}->{}_src", proto.flow_keyword())
            }
            SetField::L4Dst(proto, port) => {
                write!(f, "set_field:{port}->{}_dst", proto.flow_keyword())
            }
        }
    }
}

impl Display for Next {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Next::GotoTable(table) => write!(f, "goto_table:{table}"),
            Next::Controller => f.write_str("CONTROLLER"),
            Next::Drop => f.write_str("drop"),
        }
    }
}

impl Display for FlowEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "priority={}", self.priority)?;
        let matcher = self.matcher.to_string();
        if !matcher.is_empty() {
            write!(f, ",{matcher}")?;
        }
        f.write_str(" actions=")?;
        for field in &self.set_fields {
            write!(f, "{field},")?;
        }
        write!(f, "{}", self.next)
    }
}
